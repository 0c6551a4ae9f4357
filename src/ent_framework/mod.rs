// Ent Framework - privacy rules every entity operation is checked against

pub mod ent_privacy;

pub use ent_privacy::{authorize, can, PrivacyOperation, PrivacyRegistry, PrivacyResult, PrivacyRule, Resource};
