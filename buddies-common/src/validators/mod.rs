pub const MAX_POST_CONTENT_CHARS: usize = 2000;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_CHARS: usize = 32;
pub const MAX_LOCATION_NAME_CHARS: usize = 100;

#[derive(Debug, Eq, PartialEq)]
pub enum Validity {
    Valid,
    Invalid(&'static str),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Validity {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Validity::Invalid("Latitude must be between -90 and 90");
    }

    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Validity::Invalid("Longitude must be between -180 and 180");
    }

    Validity::Valid
}

pub fn validate_location_name(name: &str) -> Validity {
    if name.trim().is_empty() {
        return Validity::Invalid("Country and city cannot be blank");
    }

    if name.chars().count() > MAX_LOCATION_NAME_CHARS {
        return Validity::Invalid("Country or city name is too long");
    }

    Validity::Valid
}

pub fn validate_post_content(content: &str) -> Validity {
    if content.trim().is_empty() {
        return Validity::Invalid("Post content cannot be empty");
    }

    if content.chars().count() > MAX_POST_CONTENT_CHARS {
        return Validity::Invalid("Post content is too long");
    }

    Validity::Valid
}

pub fn validate_tags(tags: &[String]) -> Validity {
    if tags.len() > MAX_TAGS {
        return Validity::Invalid("Too many tags");
    }

    for tag in tags {
        if tag.trim().is_empty() || tag.chars().count() > MAX_TAG_CHARS {
            return Validity::Invalid("Tags must be between 1 and 32 characters");
        }
    }

    Validity::Valid
}
