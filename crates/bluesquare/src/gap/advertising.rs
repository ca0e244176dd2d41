use crate::uuid::Uuid;
use thiserror::Error;

/// Longest local name a controller stores
pub const MAX_LOCAL_NAME_LEN: usize = 248;

/// Errors reported by an [`Advertiser`]
#[derive(Debug, Error)]
pub enum AdvertiseError {
    #[error("advertisement rejected: {0}")]
    Rejected(String),

    #[error("advertising is not available")]
    Unavailable,

    #[error("advertiser I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the peripheral wants peers to see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementIntent {
    /// Adapter alias, at most [`MAX_LOCAL_NAME_LEN`] bytes
    pub local_name: String,
    /// Services to list, in declaration order
    pub service_uuids: Vec<Uuid>,
    pub discoverable: bool,
    pub pairable: bool,
}

impl AdvertisementIntent {
    pub fn new(local_name: &str, service_uuids: Vec<Uuid>) -> Self {
        Self {
            local_name: truncate_name(local_name).to_string(),
            service_uuids,
            discoverable: true,
            pairable: true,
        }
    }

    pub fn discoverable(mut self, discoverable: bool) -> Self {
        self.discoverable = discoverable;
        self
    }

    pub fn pairable(mut self, pairable: bool) -> Self {
        self.pairable = pairable;
        self
    }
}

/// Cuts `name` to the controller limit without splitting a character
fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_LOCAL_NAME_LEN {
        return name;
    }
    let mut end = MAX_LOCAL_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// External collaborator that publishes an advertisement
pub trait Advertiser: Send {
    /// Start advertising `intent`, replacing anything advertised before
    fn advertise(&mut self, intent: &AdvertisementIntent) -> Result<(), AdvertiseError>;

    /// Stop advertising. Withdrawing when nothing is advertised is a no-op.
    fn withdraw(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_defaults() {
        let intent = AdvertisementIntent::new("test-rs9116", vec![Uuid::from_u16(0x180F)]);
        assert_eq!(intent.local_name, "test-rs9116");
        assert!(intent.discoverable);
        assert!(intent.pairable);

        let intent = intent.discoverable(false).pairable(false);
        assert!(!intent.discoverable);
        assert!(!intent.pairable);
    }

    #[test]
    fn test_long_names_are_truncated() {
        let name = "x".repeat(300);
        assert_eq!(AdvertisementIntent::new(&name, vec![]).local_name.len(), 248);

        // 247 ASCII bytes followed by a two-byte character
        let name = format!("{}é", "x".repeat(247));
        assert_eq!(AdvertisementIntent::new(&name, vec![]).local_name.len(), 247);
    }
}
