use serde_json::json;
use tracing::info;

use crate::clients::brevo::OutgoingEmail;
use crate::clients::BrevoClient;
use crate::common::get_handlebars;
use crate::database::entities::{invitations, teams, users};
use crate::errors::{CoreResult, MailError};

pub fn get_invitation_template() -> String {
    include_str!("templates/invitation.hbs").to_string()
}

pub fn invitation_subject(team_name: &str) -> String {
    format!("You're invited to {}!", team_name)
}

pub fn render_invitation(
    team_name: &str,
    inviter: Option<&str>,
    role: &str,
    invitation_url: &str,
    sender_name: &str,
) -> Result<String, MailError> {
    let handlebars = get_handlebars();
    let html = handlebars.render_template(
        &get_invitation_template(),
        &json!({
            "team_name": team_name,
            "inviter": inviter,
            "role": role,
            "invitation_url": invitation_url,
            "sender_name": sender_name,
        }),
    )?;
    Ok(html)
}

#[derive(Clone)]
pub struct MailService {
    brevo: BrevoClient,
    invitation_base_url: String,
    sender_name: String,
}

impl MailService {
    pub fn new(brevo: BrevoClient, invitation_base_url: String, sender_name: String) -> Self {
        Self {
            brevo,
            invitation_base_url,
            sender_name,
        }
    }

    pub async fn send_invitation(
        &self,
        invitation: &invitations::Model,
        team: &teams::Model,
        inviter: Option<&users::Model>,
    ) -> CoreResult<()> {
        let inviter_name = inviter.map(|user| user.display_name());
        let url = invitation.url(&self.invitation_base_url);
        let html_content = render_invitation(
            &team.name,
            inviter_name.as_deref(),
            &invitation.role,
            &url,
            &self.sender_name,
        )?;

        self.brevo
            .send(&OutgoingEmail {
                to_email: invitation.email.clone(),
                to_name: None,
                subject: invitation_subject(&team.name),
                html_content,
            })
            .await?;
        info!("Invitation {} sent to {}", invitation.id, invitation.email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_renders_link_and_inviter() {
        let html = render_invitation(
            "Red Team",
            Some("Jane Doe"),
            "admin",
            "https://app.example/teams/invitation/abc",
            "Dogesec",
        )
        .unwrap();
        assert!(html.contains("Jane Doe has invited you"));
        assert!(html.contains("<strong>Red Team</strong>"));
        assert!(html.contains("as admin"));
        assert!(html.contains("href=\"https://app.example/teams/invitation/abc\""));
    }

    #[test]
    fn test_invitation_without_inviter() {
        let html = render_invitation("Blue", None, "member", "u", "Dogesec").unwrap();
        assert!(html.contains("Someone has invited you"));
        assert_eq!(invitation_subject("Blue"), "You're invited to Blue!");
    }
}
