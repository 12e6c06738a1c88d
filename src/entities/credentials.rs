use serde::{Deserialize, Serialize};

fn default_admin_password() -> String {
    "Admin".into()
}

fn default_super_admin_credential() -> String {
    "SuperAdmin".into()
}

// Stored in plain text with the rest of the state; login screens and
// credential management live outside this crate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default = "default_super_admin_credential")]
    pub super_admin_credential: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            admin_password: default_admin_password(),
            super_admin_credential: default_super_admin_credential(),
        }
    }
}

impl Credentials {
    pub fn admin_matches(&self, secret: &str) -> bool {
        self.admin_password == secret
    }

    pub fn super_admin_matches(&self, secret: &str) -> bool {
        self.super_admin_credential == secret
    }
}

#[test]
fn defaults_apply_to_old_documents() {
    let credentials: Credentials = serde_json::from_str("{}").unwrap();

    assert!(credentials.admin_matches("Admin"));
    assert!(credentials.super_admin_matches("SuperAdmin"));
    assert!(!credentials.admin_matches("admin"));
}
