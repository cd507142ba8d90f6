//! DNS message construction and response inspection.

use std::net::{IpAddr, SocketAddr};

use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::opt::{EdnsCode, EdnsOption};
use hickory_proto::rr::{Name, RecordType};

use crate::error::{Error, Result};

/// Port assumed when a resolver address does not carry one.
pub const DEFAULT_DNS_PORT: u16 = 53;

/// EDNS option code for Extended DNS Errors (RFC 8914).
const EDE_OPTION_CODE: u16 = 15;

/// Build a recursive query for `domain` advertising `payload_size` via EDNS0.
///
/// EDNS is always attached so filtering resolvers can return Extended DNS
/// Errors, and the payload hint keeps large answers from fragmenting.
pub fn build_query(domain: &str, record_type: RecordType, payload_size: u16) -> Result<Message> {
    let fqdn = if domain.ends_with('.') {
        domain.to_string()
    } else {
        format!("{domain}.")
    };
    let name = Name::from_ascii(&fqdn).map_err(|_| Error::InvalidInput(domain.to_string()))?;

    let mut message = Message::new();
    message.set_id(rand::random());
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(Query::query(name, record_type));

    let edns = message.extensions_mut().get_or_insert_with(Edns::new);
    edns.set_max_payload(payload_size);
    edns.set_version(0);

    Ok(message)
}

/// Ensure a resolver address carries an explicit port.
///
/// Handles `ip`, `ip:port`, bare and bracketed IPv6 literals, and hostnames.
pub fn with_default_port(address: &str) -> String {
    let address = address.trim();

    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }

    let bare = address.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_DNS_PORT).to_string();
    }

    if let Some((host, port)) = address.rsplit_once(':') {
        if !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok() {
            return address.to_string();
        }
    }

    format!("{bare}:{DEFAULT_DNS_PORT}")
}

/// Whether any record in the answer, authority or additional sections, or an
/// extended error annotation, contains `keyword` (case-insensitive).
///
/// Records are matched on their full presentation form, so a CNAME redirect
/// target, TXT data and extended error text are all covered by one scan.
pub fn contains_keyword(message: &Message, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();

    let in_records = message
        .answers()
        .iter()
        .chain(message.name_servers())
        .chain(message.additionals())
        .any(|record| record.to_string().to_lowercase().contains(&keyword));

    in_records
        || message
            .extensions()
            .as_ref()
            .and_then(extended_error_text)
            .is_some_and(|text| text.to_lowercase().contains(&keyword))
}

/// Render the Extended DNS Error option, if present, as `EDE <code>: <text>`.
fn extended_error_text(edns: &Edns) -> Option<String> {
    match edns.option(EdnsCode::from(EDE_OPTION_CODE))? {
        EdnsOption::Unknown(_, data) if data.len() >= 2 => {
            let info_code = u16::from_be_bytes([data[0], data[1]]);
            Some(format!(
                "EDE {info_code}: {}",
                String::from_utf8_lossy(&data[2..])
            ))
        }
        other => Some(format!("{other:?}")),
    }
}
