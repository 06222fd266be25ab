use serde::Deserialize;
use time::Date;

use crate::contacts::repo_types::Contact;

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub query: Option<String>,
}

impl Pagination {
    /// Offset and limit as handed to the database, which rejects
    /// negative values; anything below zero is treated as zero.
    pub fn clamped(&self) -> (i64, i64) {
        (self.skip.max(0), self.limit.max(0))
    }
}

/// Full contact payload for create.
#[derive(Debug, Deserialize)]
pub struct ContactPayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: Date,
    #[serde(default)]
    pub additional_info: Option<String>,
}

/// Partial update: absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct ContactUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<Date>,
    pub additional_info: Option<String>,
}

impl ContactUpdate {
    /// Merge only the provided fields onto an existing contact.
    pub fn apply_to(self, contact: &mut Contact) {
        if let Some(v) = self.first_name {
            contact.first_name = v;
        }
        if let Some(v) = self.last_name {
            contact.last_name = v;
        }
        if let Some(v) = self.email {
            contact.email = v;
        }
        if let Some(v) = self.phone {
            contact.phone = v;
        }
        if let Some(v) = self.birthday {
            contact.birthday = v;
        }
        if let Some(v) = self.additional_info {
            contact.additional_info = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Month, OffsetDateTime};

    fn sample_contact() -> Contact {
        Contact {
            id: 1,
            user_id: 1,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@x.com".into(),
            phone: "+380501112233".into(),
            birthday: Date::from_calendar_date(1815, Month::December, 10).unwrap(),
            additional_info: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn apply_to_merges_only_provided_fields() {
        let mut contact = sample_contact();
        let patch = ContactUpdate {
            phone: Some("+380671234567".into()),
            additional_info: Some("met at the conference".into()),
            ..Default::default()
        };
        patch.apply_to(&mut contact);
        assert_eq!(contact.phone, "+380671234567");
        assert_eq!(
            contact.additional_info.as_deref(),
            Some("met at the conference")
        );
        // Untouched fields keep their stored values.
        assert_eq!(contact.first_name, "Ada");
        assert_eq!(contact.email, "ada@x.com");
        assert_eq!(
            contact.birthday,
            Date::from_calendar_date(1815, Month::December, 10).unwrap()
        );
    }

    #[test]
    fn negative_pagination_is_clamped_to_zero() {
        let p = Pagination {
            skip: -5,
            limit: -1,
            query: None,
        };
        assert_eq!(p.clamped(), (0, 0));
        let p = Pagination {
            skip: 10,
            limit: 50,
            query: None,
        };
        assert_eq!(p.clamped(), (10, 50));
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut contact = sample_contact();
        let before = contact.clone();
        ContactUpdate::default().apply_to(&mut contact);
        assert_eq!(contact.first_name, before.first_name);
        assert_eq!(contact.phone, before.phone);
        assert_eq!(contact.birthday, before.birthday);
    }
}
