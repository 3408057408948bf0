//! Permission snapshots for executor access grants
//!
//! The owner scopes what an executor may see per contact. The whole set
//! travels as one immutable value: grants copy it at issuance and later
//! edits to the contact's record never reach an already-issued grant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A section of the vault an executor may be scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewScope {
    /// Name, date of birth, key personal information
    PersonalDetails,
    /// Medical wishes and directives
    Medical,
    /// Funeral and memorial preferences
    FuneralPreferences,
    /// Uploaded documents
    Documents,
    /// Letters addressed to the requesting contact
    Letters,
}

impl fmt::Display for ViewScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewScope::PersonalDetails => write!(f, "personal_details"),
            ViewScope::Medical => write!(f, "medical"),
            ViewScope::FuneralPreferences => write!(f, "funeral_preferences"),
            ViewScope::Documents => write!(f, "documents"),
            ViewScope::Letters => write!(f, "letters"),
        }
    }
}

/// All view scopes, in display order
pub const ALL_SCOPES: [ViewScope; 5] = [
    ViewScope::PersonalDetails,
    ViewScope::Medical,
    ViewScope::FuneralPreferences,
    ViewScope::Documents,
    ViewScope::Letters,
];

/// Flat capability set attached to a trusted-contact relationship.
///
/// `Copy` on purpose: every hand-off is a snapshot, never a shared
/// reference back into the contact record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Permissions {
    #[serde(default)]
    pub view_personal_details: bool,
    #[serde(default)]
    pub view_medical: bool,
    #[serde(default)]
    pub view_funeral_preferences: bool,
    #[serde(default)]
    pub view_documents: bool,
    #[serde(default)]
    pub view_letters: bool,
}

impl Permissions {
    /// No access to any section
    pub fn none() -> Self {
        Self::default()
    }

    /// Access to every section
    pub fn all() -> Self {
        Self {
            view_personal_details: true,
            view_medical: true,
            view_funeral_preferences: true,
            view_documents: true,
            view_letters: true,
        }
    }

    /// Check whether a scope is granted
    pub fn allows(&self, scope: ViewScope) -> bool {
        match scope {
            ViewScope::PersonalDetails => self.view_personal_details,
            ViewScope::Medical => self.view_medical,
            ViewScope::FuneralPreferences => self.view_funeral_preferences,
            ViewScope::Documents => self.view_documents,
            ViewScope::Letters => self.view_letters,
        }
    }

    /// The scopes this set grants, in display order
    pub fn granted(&self) -> Vec<ViewScope> {
        ALL_SCOPES.iter().copied().filter(|s| self.allows(*s)).collect()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let granted = self.granted();
        if granted.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<String> = granted.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_allows_nothing() {
        let p = Permissions::none();
        for scope in ALL_SCOPES {
            assert!(!p.allows(scope));
        }
        assert_eq!(p.to_string(), "none");
    }

    #[test]
    fn test_all_allows_everything() {
        let p = Permissions::all();
        for scope in ALL_SCOPES {
            assert!(p.allows(scope));
        }
        assert_eq!(p.granted().len(), 5);
    }

    #[test]
    fn test_partial_set() {
        let p = Permissions {
            view_funeral_preferences: true,
            view_letters: true,
            ..Permissions::none()
        };

        assert!(p.allows(ViewScope::FuneralPreferences));
        assert!(p.allows(ViewScope::Letters));
        assert!(!p.allows(ViewScope::Medical));
        assert_eq!(p.to_string(), "funeral_preferences,letters");
    }

    #[test]
    fn test_serde_round_trip() {
        let p = Permissions {
            view_medical: true,
            ..Permissions::none()
        };

        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"view_medical\":true"));

        let back: Permissions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_missing_fields_default_false() {
        let back: Permissions = serde_json::from_str(r#"{"view_documents":true}"#).unwrap();
        assert!(back.view_documents);
        assert!(!back.view_medical);
    }
}
