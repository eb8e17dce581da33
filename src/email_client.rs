/// Outbound notification client.
///
/// Talks JSON to an HTTP email gateway. Delivery is best-effort from the
/// caller's point of view: registration never fails because the gateway
/// is down.

use serde::Serialize;

use crate::validators::is_valid_email;

#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: SenderEmail,
}

#[derive(Clone)]
pub struct SenderEmail(String);

impl SenderEmail {
    pub fn parse(s: String) -> Result<Self, String> {
        let email = is_valid_email(&s).map_err(|e| e.to_string())?;
        Ok(Self(email))
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
struct SendEmailRequest {
    from: String,
    to: String,
    #[serde(rename = "Subject")]
    subject: String,
    #[serde(rename = "Html")]
    html: String,
}

impl EmailClient {
    pub fn new(base_url: String, sender: SenderEmail, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url,
            sender,
        }
    }

    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
    ) -> Result<(), String> {
        let url = format!("{}/email", self.base_url);
        let request = SendEmailRequest {
            from: self.sender.inner().to_string(),
            to: recipient.to_string(),
            subject: subject.to_string(),
            html: html_content.to_string(),
        };

        self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("failed to send email: {}", e))?
            .error_for_status()
            .map_err(|e| format!("email service returned error: {}", e))?;

        Ok(())
    }

    /// Greeting mail sent after a successful registration.
    pub async fn send_welcome_email(&self, recipient: &str, username: &str) -> Result<(), String> {
        let subject = "Welcome to Staffdesk";
        let html = format!(
            "<h1>Welcome to Staffdesk</h1>\
             <p>Hello <strong>{username}</strong>,</p>\
             <p>Your account has been created. You can now sign in and \
             manage employees and departments.</p>\
             <p>If you did not register this account, please ignore this \
             message.</p>",
        );

        self.send_email(recipient, subject, &html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_email_parse_valid() {
        assert!(SenderEmail::parse("noreply@staffdesk.example".to_string()).is_ok());
    }

    #[test]
    fn test_sender_email_parse_invalid() {
        assert!(SenderEmail::parse("not-an-email".to_string()).is_err());
    }
}
