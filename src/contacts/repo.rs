use sqlx::PgPool;
use time::{Date, Duration, OffsetDateTime};

use crate::contacts::dto::{ContactPayload, ContactUpdate};
use crate::contacts::repo_types::Contact;

const CONTACT_COLUMNS: &str = "id, user_id, first_name, last_name, email, phone, birthday, \
                               additional_info, created_at, updated_at";

fn month_day(date: Date) -> String {
    format!("{:02}-{:02}", date.month() as u8, date.day())
}

impl Contact {
    pub async fn list(
        db: &PgPool,
        user_id: i64,
        skip: i64,
        limit: i64,
        query: Option<&str>,
    ) -> anyhow::Result<Vec<Contact>> {
        let rows = match query {
            Some(q) => {
                let pattern = format!("%{q}%");
                sqlx::query_as::<_, Contact>(&format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts
                     WHERE user_id = $1
                       AND (first_name ILIKE $2 OR last_name ILIKE $2 OR email ILIKE $2)
                     ORDER BY id
                     OFFSET $3 LIMIT $4"
                ))
                .bind(user_id)
                .bind(pattern)
                .bind(skip)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Contact>(&format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts
                     WHERE user_id = $1
                     ORDER BY id
                     OFFSET $2 LIMIT $3"
                ))
                .bind(user_id)
                .bind(skip)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
        };
        Ok(rows)
    }

    /// Contacts whose birthday (month-day) falls within the next 7 days.
    /// The comparison is textual MM-DD, so a window spanning the year
    /// boundary returns nothing past December 31.
    pub async fn upcoming_birthdays(db: &PgPool, user_id: i64) -> anyhow::Result<Vec<Contact>> {
        let today = OffsetDateTime::now_utc().date();
        let end = today + Duration::days(7);
        let rows = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE user_id = $1
               AND to_char(birthday, 'MM-DD') BETWEEN $2 AND $3
             ORDER BY to_char(birthday, 'MM-DD')"
        ))
        .bind(user_id)
        .bind(month_day(today))
        .bind(month_day(end))
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id(
        db: &PgPool,
        user_id: i64,
        contact_id: i64,
    ) -> anyhow::Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND user_id = $2"
        ))
        .bind(contact_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }

    pub async fn create(
        db: &PgPool,
        user_id: i64,
        body: &ContactPayload,
    ) -> anyhow::Result<Contact> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "INSERT INTO contacts
                 (user_id, first_name, last_name, email, phone, birthday, additional_info)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&body.first_name)
        .bind(&body.last_name)
        .bind(&body.email)
        .bind(&body.phone)
        .bind(body.birthday)
        .bind(&body.additional_info)
        .fetch_one(db)
        .await?;
        Ok(contact)
    }

    /// Field-by-field merge of the provided optional fields onto the
    /// existing row. Returns None when the contact does not exist for
    /// this user.
    pub async fn update(
        db: &PgPool,
        user_id: i64,
        contact_id: i64,
        patch: ContactUpdate,
    ) -> anyhow::Result<Option<Contact>> {
        let Some(mut contact) = Self::find_by_id(db, user_id, contact_id).await? else {
            return Ok(None);
        };
        patch.apply_to(&mut contact);

        let contact = sqlx::query_as::<_, Contact>(&format!(
            "UPDATE contacts
             SET first_name = $3, last_name = $4, email = $5, phone = $6,
                 birthday = $7, additional_info = $8, updated_at = now()
             WHERE id = $1 AND user_id = $2
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(contact_id)
        .bind(user_id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(contact.birthday)
        .bind(&contact.additional_info)
        .fetch_one(db)
        .await?;
        Ok(Some(contact))
    }

    pub async fn delete(
        db: &PgPool,
        user_id: i64,
        contact_id: i64,
    ) -> anyhow::Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "DELETE FROM contacts WHERE id = $1 AND user_id = $2 RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(contact_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    #[test]
    fn month_day_is_zero_padded() {
        let d = Date::from_calendar_date(2024, Month::March, 5).unwrap();
        assert_eq!(month_day(d), "03-05");
        let d = Date::from_calendar_date(2024, Month::December, 31).unwrap();
        assert_eq!(month_day(d), "12-31");
    }
}
