//
use std::net::{Ipv4Addr, SocketAddr};

use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::{A, TXT};
use hickory_proto::rr::{RData, Record, RecordType};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::{ingest, TokenInbox, TokenSet};
use crate::Result;

/// First label of the names dns-01 proofs are looked up under.
const CHALLENGE_LABEL: &[u8] = b"_acme-challenge";

const RECORD_TTL: u32 = 3600;

/// Largest datagram we read or send. Queries are far smaller.
const MAX_DATAGRAM: usize = 4096;

/// Reply size limit for queries without EDNS.
const CLASSIC_UDP_LIMIT: usize = 512;

/// Authoritative-ish UDP DNS server for dns-01 validation.
///
/// * `TXT` for `_acme-challenge.<anything>`: one record per published token.
/// * `A` for any name: the configured address, so the validating server
///   also finds the http-01 responder and the certificate server.
/// * Anything else: an empty answer.
#[derive(Debug)]
pub struct DnsResponder {
    socket: UdpSocket,
    record: Ipv4Addr,
    tokens: TokenSet,
}

impl DnsResponder {
    pub async fn bind(addr: SocketAddr, record: Ipv4Addr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!("DNS responder listening on {}", socket.local_addr()?);
        Ok(DnsResponder {
            socket,
            record,
            tokens: TokenSet::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    /// Answer queries until `stop` is cancelled. Tokens arriving in `inbox`
    /// are served from then on.
    pub async fn serve(self, inbox: TokenInbox, stop: CancellationToken) -> Result<()> {
        tokio::spawn(ingest(inbox, self.tokens.clone(), stop.clone()));

        let mut buf = vec![0_u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = tokio::select! {
                _ = stop.cancelled() => break,
                res = self.socket.recv_from(&mut buf) => match res {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("DNS receive failed: {}", e);
                        continue;
                    }
                },
            };

            let reply = match answer(&buf[..len], &self.tokens, self.record) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("Dropping malformed DNS query from {}: {}", peer, e);
                    continue;
                }
            };

            if let Err(e) = self.socket.send_to(&reply, peer).await {
                warn!("DNS reply to {} failed: {}", peer, e);
            }
        }
        debug!("DNS responder stopped");
        Ok(())
    }
}

/// Build the wire format reply to the wire format `query`.
///
/// A reply larger than the client accepts (512 bytes, or the EDNS payload
/// size it advertised) keeps the answers that fit and has the `TC` bit set.
pub(crate) fn answer(query: &[u8], tokens: &TokenSet, record: Ipv4Addr) -> Result<Vec<u8>> {
    let query = Message::from_vec(query)?;
    let limit = query
        .extensions()
        .as_ref()
        .map(|edns| usize::from(edns.max_payload()).clamp(CLASSIC_UDP_LIMIT, MAX_DATAGRAM))
        .unwrap_or(CLASSIC_UDP_LIMIT);

    let mut reply = Message::new();
    reply
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(query.op_code())
        .set_authoritative(true)
        .set_recursion_desired(query.recursion_desired())
        .set_response_code(ResponseCode::NoError);

    for q in query.queries() {
        reply.add_query(q.clone());
        let name = q.name();
        match q.query_type() {
            RecordType::TXT => {
                let is_challenge = name
                    .iter()
                    .next()
                    .map(|label| label.eq_ignore_ascii_case(CHALLENGE_LABEL))
                    .unwrap_or(false);
                if !is_challenge {
                    continue;
                }
                for token in tokens.snapshot() {
                    let rdata = RData::TXT(TXT::new(vec![token]));
                    reply.add_answer(Record::from_rdata(name.clone(), RECORD_TTL, rdata));
                }
            }
            RecordType::A => {
                let rdata = RData::A(A(record));
                reply.add_answer(Record::from_rdata(name.clone(), RECORD_TTL, rdata));
            }
            other => trace!("No answer for {} query of {}", other, name),
        }
    }

    let bytes = reply.to_vec()?;
    if bytes.len() <= limit {
        return Ok(bytes);
    }
    truncate(reply, limit)
}

fn truncate(mut reply: Message, limit: usize) -> Result<Vec<u8>> {
    let answers = reply.take_answers();
    let total = answers.len();
    reply.set_truncated(true);
    let mut bytes = reply.to_vec()?;
    for record in answers {
        reply.add_answer(record);
        let longer = reply.to_vec()?;
        if longer.len() > limit {
            break;
        }
        bytes = longer;
    }
    debug!("DNS reply over {} bytes, truncated from {} answers", limit, total);
    Ok(bytes)
}
