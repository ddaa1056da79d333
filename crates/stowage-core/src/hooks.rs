//! Hooks and traits for host integration
//!
//! The upload behavior never touches the host's records or event system
//! directly. The host implements `UploadOwner` for each record type that
//! carries file attributes and may supply an `UploadListener` to observe
//! uploads as they are persisted.

/// A record that owns one or more file attributes.
pub trait UploadOwner: Send + Sync {
    /// Short type name of the record, e.g. `BlogPost`.
    fn model_name(&self) -> &str;

    /// Primary key components, in declaration order.
    fn primary_key(&self) -> Vec<String>;

    /// Active validation scenario, if the host uses scenarios.
    fn scenario(&self) -> Option<&str> {
        None
    }

    /// Current stored value (a link) of an attribute.
    fn attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&mut self, name: &str, value: String);

    /// Attach a validation error to an attribute.
    fn add_error(&mut self, attribute: &str, message: String);
}

/// Numeric identifier used for sharding: the leading integer of the first
/// primary key component, or 0 when there is none.
pub fn numeric_id(owner: &dyn UploadOwner) -> u64 {
    owner
        .primary_key()
        .first()
        .map(|key| {
            let digits: String = key
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().unwrap_or(0)
        })
        .unwrap_or(0)
}

/// Observer notified around each persisted attribute
pub trait UploadListener: Send + Sync {
    fn before_upload(&self, _owner: &dyn UploadOwner, _attribute: &str) {}

    fn after_upload(&self, _owner: &dyn UploadOwner, _attribute: &str) {}
}

/// No-op listener for hosts that don't observe uploads
pub struct NoOpListener;

impl UploadListener for NoOpListener {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Record {
        pk: Vec<String>,
    }

    impl UploadOwner for Record {
        fn model_name(&self) -> &str {
            "Record"
        }

        fn primary_key(&self) -> Vec<String> {
            self.pk.clone()
        }

        fn attribute(&self, _name: &str) -> Option<String> {
            None
        }

        fn set_attribute(&mut self, _name: &str, _value: String) {}

        fn add_error(&mut self, _attribute: &str, _message: String) {}
    }

    #[test]
    fn test_numeric_id_from_first_component() {
        let record = Record {
            pk: vec!["42".to_string(), "7".to_string()],
        };
        assert_eq!(numeric_id(&record), 42);
    }

    #[test]
    fn test_numeric_id_takes_leading_digits() {
        let record = Record {
            pk: vec!["123abc".to_string()],
        };
        assert_eq!(numeric_id(&record), 123);
    }

    #[test]
    fn test_numeric_id_defaults_to_zero() {
        assert_eq!(numeric_id(&Record { pk: vec![] }), 0);
        assert_eq!(
            numeric_id(&Record {
                pk: vec!["uuid-like".to_string()]
            }),
            0
        );
    }
}
