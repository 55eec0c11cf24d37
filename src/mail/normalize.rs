//! Gmail `format=full` message → [`NormalizedMail`].

use chrono::{DateTime, Utc};
use mail_parser::MessageParser;

use super::model::{Attachment, GmailCategory, NormalizedMail};
use crate::google::{GmailMessage, Header, MessagePart, decode_base64url};

/// Flatten a Gmail message into dashboard fields.
pub fn normalize(message: &GmailMessage) -> NormalizedMail {
    let payload = message.payload.as_ref();
    let headers: &[Header] = payload.map(|p| p.headers.as_slice()).unwrap_or(&[]);
    let raw = |name: &str| header_value(headers, name).unwrap_or_default().to_string();

    let from = raw("From");
    let to = raw("To");
    let parsed_block = header_block(headers);
    let parsed = MessageParser::default().parse(parsed_block.as_bytes());

    let (sender_name, sender_email) = parsed
        .as_ref()
        .and_then(|p| p.from())
        .and_then(|a| a.first())
        .map(|addr| {
            (
                addr.name().map(|n| n.trim().to_string()),
                addr.address().map(|a| a.trim().to_string()),
            )
        })
        .unwrap_or((None, None));
    let sender_email = sender_email
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| email_from_raw(&from));
    let sender_name = sender_name
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| name_from_raw(&from));

    let subject = parsed
        .as_ref()
        .and_then(|p| p.subject().map(str::to_string))
        .unwrap_or_else(|| raw("Subject"));

    let cc = parsed
        .as_ref()
        .map(|p| recipients(p.cc()))
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| split_recipients(&raw("Cc")));
    let bcc = parsed
        .as_ref()
        .map(|p| recipients(p.bcc()))
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| split_recipients(&raw("Bcc")));

    let date = parsed
        .as_ref()
        .and_then(|p| p.date())
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0))
        .or_else(|| {
            message
                .internal_date
                .as_deref()
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(DateTime::<Utc>::from_timestamp_millis)
        });

    let mut attachments = Vec::new();
    if let Some(payload) = payload {
        collect_attachments(&payload.parts, &mut attachments);
    }

    NormalizedMail {
        message_id: message.id.clone(),
        thread_id: message.thread_id.clone(),
        subject,
        snippet: message.snippet.clone(),
        from,
        to,
        sender_name,
        sender_email,
        cc,
        bcc,
        date,
        body: payload.map(extract_body).unwrap_or_default(),
        attachments,
        label_ids: message.label_ids.clone(),
        is_unread: message.label_ids.iter().any(|l| l == "UNREAD"),
        gmail_category: GmailCategory::from_labels(&message.label_ids),
    }
}

/// Case-insensitive header lookup.
pub fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Depth-first search for an attachment part's filename and MIME type.
pub fn find_attachment_part<'a>(part: &'a MessagePart, attachment_id: &str) -> Option<&'a MessagePart> {
    let matches = part
        .body
        .as_ref()
        .and_then(|b| b.attachment_id.as_deref())
        .is_some_and(|id| id == attachment_id);
    if matches {
        return Some(part);
    }
    part.parts
        .iter()
        .find_map(|child| find_attachment_part(child, attachment_id))
}

/// Rebuild the headers mail-parser needs as an RFC 5322 header block.
fn header_block(headers: &[Header]) -> String {
    let mut block = String::new();
    for name in ["From", "To", "Cc", "Bcc", "Subject", "Date"] {
        if let Some(value) = header_value(headers, name) {
            block.push_str(name);
            block.push_str(": ");
            block.push_str(&value.replace(['\r', '\n'], " "));
            block.push_str("\r\n");
        }
    }
    block.push_str("\r\n");
    block
}

fn recipients(addr: Option<&mail_parser::Address>) -> Vec<String> {
    let format = |a: &mail_parser::Addr| -> Option<String> {
        let address = a.address()?.trim();
        match a.name().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => Some(format!("{name} <{address}>")),
            None => Some(address.to_string()),
        }
    };
    match addr {
        None => Vec::new(),
        Some(mail_parser::Address::List(addrs)) => addrs.iter().filter_map(format).collect(),
        Some(mail_parser::Address::Group(groups)) => groups
            .iter()
            .flat_map(|g| g.addresses.iter().filter_map(format))
            .collect(),
    }
}

fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Address inside `<...>`, else the trimmed raw value.
fn email_from_raw(raw: &str) -> String {
    if let Some(start) = raw.find('<')
        && let Some(len) = raw[start + 1..].find('>')
    {
        return raw[start + 1..start + 1 + len].trim().to_string();
    }
    raw.trim().to_string()
}

/// Text before `<`, without surrounding quotes.
fn name_from_raw(raw: &str) -> String {
    raw.split('<')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

fn collect_attachments(parts: &[MessagePart], out: &mut Vec<Attachment>) {
    for part in parts {
        if !part.parts.is_empty() {
            collect_attachments(&part.parts, out);
        } else if !part.filename.is_empty()
            && let Some(id) = part.body.as_ref().and_then(|b| b.attachment_id.as_deref())
        {
            out.push(Attachment {
                filename: part.filename.clone(),
                mime_type: part.mime_type.clone(),
                attachment_id: id.to_string(),
            });
        }
    }
}

fn find_text_data(parts: &[MessagePart]) -> Option<&str> {
    for part in parts {
        if !part.parts.is_empty() {
            if let Some(data) = find_text_data(&part.parts) {
                return Some(data);
            }
        } else if matches!(part.mime_type.as_str(), "text/plain" | "text/html")
            && let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref())
            && !data.is_empty()
        {
            return Some(data);
        }
    }
    None
}

fn extract_body(payload: &MessagePart) -> String {
    let encoded = find_text_data(&payload.parts).or_else(|| {
        payload
            .body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    });
    match encoded {
        Some(data) => match decode_base64url(data) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::debug!("Undecodable message body: {e}");
                String::new()
            }
        },
        None => String::new(),
    }
}
