//! Transactional email bodies. Everything here is pure: no I/O, no state.

use ammonia::clean_text;
use chrono::Datelike;

use crate::config::AppConfig;
use crate::services::otp::{CODE_TTL_MINUTES, RESET_TTL_MINUTES};

const PRIMARY: &str = "#d4af37";
const LIGHT_BG: &str = "#fff8dc";
const DARK: &str = "#1a1a1a";

#[derive(Debug, Clone)]
pub struct Email {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Brand settings shared by every message.
#[derive(Debug, Clone)]
pub struct Branding {
    pub app_url: String,
    pub logo_url: String,
}

impl Branding {
    pub fn from_config(config: &AppConfig) -> Self {
        Branding {
            app_url: config.app_url.trim_end_matches('/').to_string(),
            logo_url: config.logo_url(),
        }
    }
}

fn esc(value: &str) -> String {
    clean_text(value)
}

fn recipient_name(to: &str) -> &str {
    to.split('@').next().unwrap_or(to)
}

fn button(href: &str, label: &str) -> String {
    format!(
        r#"<a href="{href}" target="_blank" class="btn" style="background-color:{PRIMARY}; color:#ffffff; font-weight:bold; text-decoration:none; padding:14px 30px; border-radius:6px; display:inline-block; font-size:16px;">{label}</a>"#,
        href = esc(href),
    )
}

fn layout(branding: &Branding, title: &str, body_html: &str) -> String {
    let year = chrono::Utc::now().year();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
</head>
<body style="margin:0; padding:0; background-color:{LIGHT_BG}; font-family:Arial, sans-serif;">
  <table role="presentation" cellpadding="0" cellspacing="0" border="0" width="100%" bgcolor="{LIGHT_BG}">
    <tr>
      <td align="center" style="padding:40px 12px;">
        <table role="presentation" cellpadding="0" cellspacing="0" border="0" width="100%" style="max-width:600px; background-color:#ffffff; border-radius:10px; overflow:hidden;">
          <tr>
            <td style="background-color:{PRIMARY}; padding:20px 32px; text-align:center;">
              <img src="{logo}" alt="Finance Teque" width="180" style="max-width:180px; width:100%; height:auto; display:block; margin:0 auto;">
            </td>
          </tr>
          <tr>
            <td style="padding:36px 32px;">
              {body_html}
            </td>
          </tr>
          <tr>
            <td style="padding:20px 32px 36px;">
              <div style="border-top:1px solid #eeeeee; padding-top:16px; text-align:center; color:#666666; font-size:13px; line-height:1.5;">
                <p style="margin:0 0 8px;">Best regards,<br><strong>Finance Teque Team</strong></p>
                <p style="margin:0 0 8px; color:#888888;">18B. Fatima Plaza, Second Floor, Murtala Muhammad Way, Kano, Nigeria</p>
                <p style="margin:0; color:#888888;">&copy; {year} Finance Teque Investment Growth. All rights reserved.</p>
              </div>
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</body>
</html>"#,
        logo = esc(&branding.logo_url),
    )
}

fn greeting(heading: &str, name: &str) -> String {
    format!(
        r#"<h1 style="color:{DARK}; font-size:24px; margin:0 0 16px; text-align:center;">{heading}</h1>
  <p style="color:#333333; font-size:16px; line-height:1.6; margin:0 0 16px;">Hello {name},</p>"#,
        name = esc(name),
    )
}

pub fn verification_code(branding: &Branding, to: &str, code: &str) -> Email {
    let name = recipient_name(to);
    let body = format!(
        r#"{greeting}
  <p style="color:#333333; font-size:16px; line-height:1.6; margin:0 0 16px;">Use the verification code below to complete your request:</p>
  <div style="background-color:#f9f9f9; border:1px solid #eeeeee; border-radius:6px; padding:18px; margin:20px 0; text-align:center;">
    <span style="font-size:32px; font-weight:bold; letter-spacing:6px; color:{PRIMARY};">{code}</span>
  </div>
  <p style="color:#333333; font-size:16px; line-height:1.6; margin:0 0 16px;">This code expires in <strong>{CODE_TTL_MINUTES} minutes</strong>.</p>
  <p style="color:#666666; font-size:14px; line-height:1.6; margin:0;">If you didn't request this, please ignore this email.</p>"#,
        greeting = greeting("Your Verification Code", name),
        code = esc(code),
    );

    Email {
        subject: "Your verification code".to_string(),
        text: format!(
            "Hello {name},\n\nYour OTP is: {code}\n\nThe code expires in {CODE_TTL_MINUTES} minutes.\n\nIf you didn't request this, ignore this email."
        ),
        html: layout(branding, "Your Verification Code", &body),
    }
}

pub fn password_reset(branding: &Branding, to: &str, token: &str) -> Email {
    let name = recipient_name(to);
    let reset_url = format!(
        "{}/reset-password?token={}",
        branding.app_url,
        urlencode(token)
    );
    let body = format!(
        r#"{greeting}
  <p style="color:#333333; font-size:16px; line-height:1.6; margin:0 0 24px;">We received a request to reset your password. Click the button below to set a new password.</p>
  <div style="text-align:center; margin:24px 0;">{button}</div>
  <p style="color:#333333; font-size:16px; line-height:1.6; margin:0 0 16px;">This link expires in <strong>{RESET_TTL_MINUTES} minutes</strong>. If you didn't request this, ignore this email.</p>
  <p style="color:#333333; font-size:14px; line-height:1.6; margin:16px 0 6px;">Or copy and paste this URL:</p>
  <p style="font-size:12px; line-height:1.5; color:#666666; word-break:break-all; margin:0;">{url}</p>"#,
        greeting = greeting("Password Reset Request", name),
        button = button(&reset_url, "Reset Password"),
        url = esc(&reset_url),
    );

    Email {
        subject: "Password reset request".to_string(),
        text: format!(
            "Hello {name},\n\nUse this link to reset your password (expires in {RESET_TTL_MINUTES} minutes):\n{reset_url}\n\nIf you didn't request this, ignore this email."
        ),
        html: layout(branding, "Reset Your Password", &body),
    }
}

pub fn welcome(branding: &Branding, to: &str, name: Option<&str>) -> Email {
    let name = name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| recipient_name(to));
    let dashboard = format!("{}/dashboard", branding.app_url);
    let body = format!(
        r#"{greeting}
  <p style="color:#333333; font-size:16px; line-height:1.6; margin:0 0 16px;">We're excited to have you with us. Explore ethical investment opportunities and track your portfolio with ease.</p>
  <div style="text-align:center; margin:24px 0;">{button}</div>
  <ul style="color:#333333; font-size:16px; line-height:1.6; margin:0 0 16px; padding-left:20px;">
    <li style="margin-bottom:8px;">Access ethical investment opportunities</li>
    <li style="margin-bottom:8px;">Get financing for your business</li>
    <li style="margin-bottom:8px;">Connect with strategic partners</li>
    <li style="margin-bottom:8px;">Track your portfolio performance</li>
  </ul>
  <p style="color:#333333; font-size:16px; line-height:1.6; margin:0;">Need help? Reply to this email.</p>"#,
        greeting = greeting("Welcome to Finance Teque!", name),
        button = button(&dashboard, "Access Your Account"),
    );

    Email {
        subject: "Welcome to Finance Teque".to_string(),
        text: format!(
            "Hello {name},\n\nWelcome to Finance Teque! Access your account:\n{dashboard}\n\nWe're glad you're here."
        ),
        html: layout(branding, "Welcome to Finance Teque", &body),
    }
}

/// Percent-encodes everything outside RFC 3986 unreserved characters.
fn urlencode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}
