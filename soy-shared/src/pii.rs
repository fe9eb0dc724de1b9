use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A wrapper for sensitive data (identity numbers, gateway salts) that masks its
/// value in Debug and Display output.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // API responses and the database need the real value; only log macros are masked.
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Masked(value)
    }
}

impl From<&str> for Masked<String> {
    fn from(value: &str) -> Self {
        Masked(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_are_masked() {
        let aadhar = Masked::from("123412341234");
        assert_eq!(format!("{:?}", aadhar), "********");
        assert_eq!(format!("{}", aadhar), "********");
        assert_eq!(aadhar.expose(), "123412341234");
    }

    #[test]
    fn test_serialization_keeps_value() {
        let aadhar = Masked::from("123412341234");
        let json = serde_json::to_string(&aadhar).unwrap();
        assert_eq!(json, "\"123412341234\"");

        let back: Masked<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, aadhar);
    }
}
