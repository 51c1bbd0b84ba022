//! Booking confirmation notifications.

use async_trait::async_trait;
use aws_sdk_ses::types::{Body, Content, Destination, Message};
use tracing::info;

use crate::models::{Booking, TimeSlot};
use crate::{Error, Result};

/// Best-effort delivery of booking notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmed(&self, booking: &Booking, slot: &TimeSlot) -> Result<()>;
}

/// Rendered email content.
#[derive(Debug, Clone)]
pub struct Email {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Render the confirmation email for a booking.
pub fn confirmation_email(booking: &Booking, slot: &TimeSlot) -> Email {
    let when = format!(
        "{} - {} UTC",
        slot.starts_at.format("%A, %B %-d %Y, %H:%M"),
        slot.ends_at.format("%H:%M")
    );

    let mut lines = vec![
        format!("Hi {},", booking.customer_name),
        String::new(),
        format!(
            "{} is booked for {} on {}.",
            booking.student_name, slot.program, when
        ),
        format!("Package: {}", booking.package_code),
        format!("Booking reference: {}", booking.id),
    ];
    if let Some(notes) = booking.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        lines.push(format!("Notes: {}", notes));
    }
    let text = lines.join("\n");

    let html = format!(
        r#"
        <!DOCTYPE html>
        <html>
        <head><meta charset="UTF-8"></head>
        <body style="font-family: sans-serif; padding: 20px;">
            <h2>Booking confirmed</h2>
            <p>{}</p>
        </body>
        </html>
        "#,
        escape_html(&text).replace('\n', "<br>")
    );

    Email {
        subject: format!("Booking confirmed: {} on {}", slot.program, when),
        html,
        text,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Sends confirmations through Amazon SES.
pub struct SesNotifier {
    client: aws_sdk_ses::Client,
    from_email: String,
    business_email: Option<String>,
}

impl SesNotifier {
    pub fn new(
        client: aws_sdk_ses::Client,
        from_email: String,
        business_email: Option<String>,
    ) -> Self {
        Self {
            client,
            from_email,
            business_email,
        }
    }

    async fn send(&self, to_email: &str, email: &Email) -> Result<String> {
        let content = |data: &str, what: &str| {
            Content::builder()
                .data(data)
                .charset("UTF-8")
                .build()
                .map_err(|e| Error::Aws(format!("Failed to build {}: {}", what, e)))
        };

        let message = Message::builder()
            .subject(content(&email.subject, "subject")?)
            .body(
                Body::builder()
                    .html(content(&email.html, "body")?)
                    .text(content(&email.text, "text body")?)
                    .build(),
            )
            .build();

        let destination = Destination::builder().to_addresses(to_email).build();

        let result = self
            .client
            .send_email()
            .source(&self.from_email)
            .destination(destination)
            .message(message)
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to send email: {}", e)))?;

        Ok(result.message_id().to_string())
    }
}

#[async_trait]
impl Notifier for SesNotifier {
    async fn booking_confirmed(&self, booking: &Booking, slot: &TimeSlot) -> Result<()> {
        let email = confirmation_email(booking, slot);

        let message_id = self.send(&booking.customer_email, &email).await?;
        info!(booking_id = %booking.id, message_id = %message_id, "Confirmation sent to customer");

        if let Some(business_email) = &self.business_email {
            let message_id = self.send(business_email, &email).await?;
            info!(booking_id = %booking.id, message_id = %message_id, "Confirmation sent to business");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn slot() -> TimeSlot {
        TimeSlot {
            id: Uuid::new_v4(),
            program: "Beginner Swim".to_string(),
            starts_at: Utc.with_ymd_and_hms(2026, 3, 7, 10, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2026, 3, 7, 10, 30, 0).unwrap(),
            max_capacity: 4,
            current_enrollment: 1,
        }
    }

    fn booking(slot: &TimeSlot, customer_name: &str, notes: &str) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            time_slot_id: slot.id,
            package_code: "PKG-1".to_string(),
            customer_email: "pat@example.com".to_string(),
            customer_name: customer_name.to_string(),
            customer_phone: None,
            student_name: "Sam".to_string(),
            student_age: Some(6),
            notes: Some(notes.to_string()),
            status: BookingStatus::Confirmed,
            booking_date: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_confirmation_email() {
        let slot = slot();
        let booking = booking(&slot, "Pat", "Bring goggles\nand a towel");

        let email = confirmation_email(&booking, &slot);

        assert_eq!(
            email.subject,
            "Booking confirmed: Beginner Swim on Saturday, March 7 2026, 10:00 - 10:30 UTC"
        );
        assert!(email.text.starts_with("Hi Pat,"));
        assert!(email.text.contains("Sam is booked for Beginner Swim"));
        assert!(email.text.contains("Package: PKG-1"));
        assert!(email.html.contains("Bring goggles<br>and a towel"));
    }

    #[test]
    fn test_confirmation_email_escapes_markup() {
        let slot = slot();
        let booking = booking(
            &slot,
            r#"<a href="http://evil">Click</a>"#,
            "<img src=x onerror=alert(1)> & more",
        );

        let email = confirmation_email(&booking, &slot);

        assert!(!email.html.contains("<a href"));
        assert!(!email.html.contains("<img"));
        assert!(email.html.contains("&lt;a href=&quot;http://evil&quot;&gt;Click&lt;/a&gt;"));
        assert!(email.html.contains("&lt;img src=x onerror=alert(1)&gt; &amp; more"));
        // Plain text stays as entered.
        assert!(email.text.contains("<img src=x onerror=alert(1)>"));
    }
}
