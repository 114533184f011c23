//! DNS message model and wire codec (RFC 1035).
//!
//! Messages are parsed into owned structures so resolvers can inspect and
//! rewrite sections without touching raw packets. Packing does not emit
//! compression pointers; parsing follows them.

use crate::error::WireError;
use std::fmt;
use std::str::FromStr;

// DNS wire format constants
const HEADER_LEN: usize = 12;
const FLAG_QR: u16 = 0x8000;
const OPCODE_SHIFT: u16 = 11;
const OPCODE_MASK: u16 = 0x7800;
const FLAG_AA: u16 = 0x0400;
const FLAG_TC: u16 = 0x0200;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;
const RCODE_MASK: u16 = 0x000F;

// RFC 1035: maximum hostname length is 253 characters
const MAX_NAME_LEN: usize = 253;
// RFC 1035: maximum label length is 63 characters
const MAX_LABEL_LEN: usize = 63;
// RFC 1035: a character-string is at most 255 octets
const MAX_STRING_LEN: usize = 255;

// DNS record type values (RFC 1035 + extensions)
const TYPE_A: u16 = 1;
const TYPE_NS: u16 = 2;
const TYPE_CNAME: u16 = 5;
const TYPE_SOA: u16 = 6;
const TYPE_PTR: u16 = 12;
const TYPE_MX: u16 = 15;
const TYPE_TXT: u16 = 16;
const TYPE_AAAA: u16 = 28;

/// The Internet class.
pub const CLASS_IN: u16 = 1;

/// A validated domain name in presentation form, stored with a trailing dot.
///
/// Names preserve the case they were created with; equality and hashing are
/// byte-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(String);

impl Name {
    /// Creates a name from presentation form. A trailing dot is optional;
    /// the root name is `"."` or the empty string.
    pub fn new(s: &str) -> Result<Name, WireError> {
        let trimmed = s.strip_suffix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(Name(".".to_string()));
        }
        if trimmed.len() > MAX_NAME_LEN {
            return Err(WireError::NameTooLong);
        }
        for label in trimmed.split('.') {
            if label.is_empty() {
                return Err(WireError::InvalidName);
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(WireError::LabelTooLong);
            }
        }
        Ok(Name(format!("{}.", trimmed)))
    }

    /// The root name.
    pub fn root() -> Name {
        Name(".".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "."
    }

    /// Returns a copy of the name with ASCII letters folded to lower case.
    pub fn to_ascii_lowercase(&self) -> Name {
        Name(self.0.to_ascii_lowercase())
    }
}

impl FromStr for Name {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Name, WireError> {
        Name::new(s)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// DNS record types the cache and reordering logic understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    Other(u16),
}

impl RecordType {
    /// Create from raw type value
    pub fn from_u16(value: u16) -> Self {
        match value {
            TYPE_A => RecordType::A,
            TYPE_NS => RecordType::NS,
            TYPE_CNAME => RecordType::CNAME,
            TYPE_SOA => RecordType::SOA,
            TYPE_PTR => RecordType::PTR,
            TYPE_MX => RecordType::MX,
            TYPE_TXT => RecordType::TXT,
            TYPE_AAAA => RecordType::AAAA,
            other => RecordType::Other(other),
        }
    }

    /// Convert to raw type value
    pub fn to_u16(self) -> u16 {
        match self {
            RecordType::A => TYPE_A,
            RecordType::NS => TYPE_NS,
            RecordType::CNAME => TYPE_CNAME,
            RecordType::SOA => TYPE_SOA,
            RecordType::PTR => TYPE_PTR,
            RecordType::MX => TYPE_MX,
            RecordType::TXT => TYPE_TXT,
            RecordType::AAAA => TYPE_AAAA,
            RecordType::Other(v) => v,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::NS => write!(f, "NS"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::SOA => write!(f, "SOA"),
            RecordType::PTR => write!(f, "PTR"),
            RecordType::MX => write!(f, "MX"),
            RecordType::TXT => write!(f, "TXT"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::Other(v) => write!(f, "TYPE{}", v),
        }
    }
}

/// A DNS response code. Values above 15 cannot be packed into the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rcode(pub u16);

impl Rcode {
    pub const NO_ERROR: Rcode = Rcode(0);
    pub const FORMAT_ERROR: Rcode = Rcode(1);
    pub const SERVER_FAILURE: Rcode = Rcode(2);
    pub const NAME_ERROR: Rcode = Rcode(3);
    pub const NOT_IMPLEMENTED: Rcode = Rcode(4);
    pub const REFUSED: Rcode = Rcode(5);
}

impl fmt::Display for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Rcode::NO_ERROR => write!(f, "NOERROR"),
            Rcode::FORMAT_ERROR => write!(f, "FORMERR"),
            Rcode::SERVER_FAILURE => write!(f, "SERVFAIL"),
            Rcode::NAME_ERROR => write!(f, "NXDOMAIN"),
            Rcode::NOT_IMPLEMENTED => write!(f, "NOTIMP"),
            Rcode::REFUSED => write!(f, "REFUSED"),
            Rcode(v) => write!(f, "RCODE{}", v),
        }
    }
}

/// A DNS message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub id: u16,
    pub response: bool,
    pub opcode: u8,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub rcode: Rcode,
}

impl Header {
    /// Parses the fixed 12-byte message header.
    pub fn parse(buf: &[u8]) -> Result<Header, WireError> {
        Header::parse_counts(buf).map(|(h, _)| h)
    }

    fn parse_counts(buf: &[u8]) -> Result<(Header, [usize; 4]), WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::PacketTooShort);
        }
        let id = u16::from_be_bytes([buf[0], buf[1]]);
        let flags = u16::from_be_bytes([buf[2], buf[3]]);
        let counts = [
            u16::from_be_bytes([buf[4], buf[5]]) as usize,
            u16::from_be_bytes([buf[6], buf[7]]) as usize,
            u16::from_be_bytes([buf[8], buf[9]]) as usize,
            u16::from_be_bytes([buf[10], buf[11]]) as usize,
        ];
        let header = Header {
            id,
            response: flags & FLAG_QR != 0,
            opcode: ((flags & OPCODE_MASK) >> OPCODE_SHIFT) as u8,
            authoritative: flags & FLAG_AA != 0,
            truncated: flags & FLAG_TC != 0,
            recursion_desired: flags & FLAG_RD != 0,
            recursion_available: flags & FLAG_RA != 0,
            rcode: Rcode(flags & RCODE_MASK),
        };
        Ok((header, counts))
    }

    fn flags(&self) -> u16 {
        let mut flags = (u16::from(self.opcode) << OPCODE_SHIFT) & OPCODE_MASK;
        if self.response {
            flags |= FLAG_QR;
        }
        if self.authoritative {
            flags |= FLAG_AA;
        }
        if self.truncated {
            flags |= FLAG_TC;
        }
        if self.recursion_desired {
            flags |= FLAG_RD;
        }
        if self.recursion_available {
            flags |= FLAG_RA;
        }
        flags | (self.rcode.0 & RCODE_MASK)
    }
}

/// A question in the question section of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    pub name: Name,
    pub rtype: RecordType,
    pub class: u16,
}

/// The part of a resource record common to all record types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHeader {
    pub name: Name,
    pub rtype: RecordType,
    pub class: u16,
    /// Seconds the record may be cached.
    pub ttl: u32,
}

/// Typed RDATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceBody {
    A([u8; 4]),
    Aaaa([u8; 16]),
    Cname(Name),
    Soa {
        ns: Name,
        mbox: Name,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        min_ttl: u32,
    },
    Mx {
        preference: u16,
        exchange: Name,
    },
    Ns(Name),
    Txt(Vec<String>),
    Ptr(Name),
    /// Raw RDATA for record types this crate does not model.
    Unknown(Vec<u8>),
}

/// A resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub header: ResourceHeader,
    pub body: ResourceBody,
}

/// A complete DNS message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Resource>,
    pub authorities: Vec<Resource>,
    pub additionals: Vec<Resource>,
}

impl Message {
    /// Parses a complete message from raw bytes.
    pub fn parse(buf: &[u8]) -> Result<Message, WireError> {
        let (header, [qd, an, ns, ar]) = Header::parse_counts(buf)?;
        let mut pos = HEADER_LEN;

        let mut questions = Vec::with_capacity(qd);
        for _ in 0..qd {
            let (question, next) = parse_question(buf, pos)?;
            questions.push(question);
            pos = next;
        }

        let (answers, pos) = parse_resources(buf, pos, an)?;
        let (authorities, pos) = parse_resources(buf, pos, ns)?;
        let (additionals, _) = parse_resources(buf, pos, ar)?;

        Ok(Message {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// Appends the packed message to `buf` using append semantics.
    ///
    /// On error `buf` may hold a partially packed message; callers that care
    /// should truncate back to the starting length.
    pub fn append_pack(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        if self.header.rcode.0 > RCODE_MASK {
            return Err(WireError::InvalidRcode);
        }
        let counts = [
            self.questions.len(),
            self.answers.len(),
            self.authorities.len(),
            self.additionals.len(),
        ];
        if counts.iter().any(|&c| c > u16::MAX as usize) {
            return Err(WireError::TooManyRecords);
        }

        buf.extend_from_slice(&self.header.id.to_be_bytes());
        buf.extend_from_slice(&self.header.flags().to_be_bytes());
        for count in counts {
            buf.extend_from_slice(&(count as u16).to_be_bytes());
        }

        for question in &self.questions {
            encode_name(buf, &question.name);
            buf.extend_from_slice(&question.rtype.to_u16().to_be_bytes());
            buf.extend_from_slice(&question.class.to_be_bytes());
        }
        for resource in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
        {
            pack_resource(buf, resource)?;
        }
        Ok(())
    }

    /// Packs the message into a freshly allocated buffer.
    pub fn pack(&self) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::with_capacity(HEADER_LEN + 64);
        self.append_pack(&mut buf)?;
        Ok(buf)
    }
}

fn get_u16(buf: &[u8], pos: usize) -> Result<u16, WireError> {
    let b = buf.get(pos..pos + 2).ok_or(WireError::PacketTooShort)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn get_u32(buf: &[u8], pos: usize) -> Result<u32, WireError> {
    let b = buf.get(pos..pos + 4).ok_or(WireError::PacketTooShort)?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn parse_question(buf: &[u8], pos: usize) -> Result<(Question, usize), WireError> {
    let (name, pos) = parse_name(buf, pos)?;
    let rtype = RecordType::from_u16(get_u16(buf, pos)?);
    let class = get_u16(buf, pos + 2)?;
    Ok((Question { name, rtype, class }, pos + 4))
}

fn parse_resources(
    buf: &[u8],
    mut pos: usize,
    count: usize,
) -> Result<(Vec<Resource>, usize), WireError> {
    let mut resources = Vec::with_capacity(count);
    for _ in 0..count {
        let (resource, next) = parse_resource(buf, pos)?;
        resources.push(resource);
        pos = next;
    }
    Ok((resources, pos))
}

fn parse_resource(buf: &[u8], pos: usize) -> Result<(Resource, usize), WireError> {
    let (name, pos) = parse_name(buf, pos)?;
    let rtype = RecordType::from_u16(get_u16(buf, pos)?);
    let class = get_u16(buf, pos + 2)?;
    let ttl = get_u32(buf, pos + 4)?;
    let rdlen = get_u16(buf, pos + 8)? as usize;
    let rdata_start = pos + 10;
    let rdata_end = rdata_start + rdlen;
    if buf.len() < rdata_end {
        return Err(WireError::PacketTooShort);
    }

    let body = parse_body(buf, rdata_start, rdata_end, rtype)?;
    let resource = Resource {
        header: ResourceHeader {
            name,
            rtype,
            class,
            ttl,
        },
        body,
    };
    Ok((resource, rdata_end))
}

fn parse_body(
    buf: &[u8],
    start: usize,
    end: usize,
    rtype: RecordType,
) -> Result<ResourceBody, WireError> {
    let rdata = &buf[start..end];
    match rtype {
        RecordType::A => {
            let octets: [u8; 4] = rdata.try_into().map_err(|_| WireError::RdataOverrun)?;
            Ok(ResourceBody::A(octets))
        }
        RecordType::AAAA => {
            let octets: [u8; 16] = rdata.try_into().map_err(|_| WireError::RdataOverrun)?;
            Ok(ResourceBody::Aaaa(octets))
        }
        RecordType::CNAME => {
            let (name, pos) = parse_name(buf, start)?;
            if pos != end {
                return Err(WireError::RdataOverrun);
            }
            Ok(ResourceBody::Cname(name))
        }
        RecordType::NS => {
            let (name, pos) = parse_name(buf, start)?;
            if pos != end {
                return Err(WireError::RdataOverrun);
            }
            Ok(ResourceBody::Ns(name))
        }
        RecordType::PTR => {
            let (name, pos) = parse_name(buf, start)?;
            if pos != end {
                return Err(WireError::RdataOverrun);
            }
            Ok(ResourceBody::Ptr(name))
        }
        RecordType::MX => {
            let preference = get_u16(buf, start)?;
            let (exchange, pos) = parse_name(buf, start + 2)?;
            if pos != end {
                return Err(WireError::RdataOverrun);
            }
            Ok(ResourceBody::Mx {
                preference,
                exchange,
            })
        }
        RecordType::SOA => {
            let (ns, pos) = parse_name(buf, start)?;
            let (mbox, pos) = parse_name(buf, pos)?;
            if pos + 20 != end {
                return Err(WireError::RdataOverrun);
            }
            Ok(ResourceBody::Soa {
                ns,
                mbox,
                serial: get_u32(buf, pos)?,
                refresh: get_u32(buf, pos + 4)?,
                retry: get_u32(buf, pos + 8)?,
                expire: get_u32(buf, pos + 12)?,
                min_ttl: get_u32(buf, pos + 16)?,
            })
        }
        RecordType::TXT => {
            let mut strings = Vec::new();
            let mut pos = start;
            while pos < end {
                let len = rdata[pos - start] as usize;
                pos += 1;
                if pos + len > end {
                    return Err(WireError::RdataOverrun);
                }
                let s = std::str::from_utf8(&buf[pos..pos + len])
                    .map_err(|_| WireError::InvalidText)?;
                strings.push(s.to_string());
                pos += len;
            }
            Ok(ResourceBody::Txt(strings))
        }
        RecordType::Other(_) => Ok(ResourceBody::Unknown(rdata.to_vec())),
    }
}

/// Parses a name from the buffer, following compression pointers.
///
/// Returns the name and the position just past its encoding at `start`
/// (pointer targets do not advance the cursor).
fn parse_name(buf: &[u8], start: usize) -> Result<(Name, usize), WireError> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = start;
    let mut followed_pointer = false;
    let mut end_pos = 0;
    let mut total_len = 0usize;

    loop {
        if pos >= buf.len() {
            return Err(WireError::PacketTooShort);
        }

        let len = buf[pos] as usize;

        if len == 0 {
            if !followed_pointer {
                end_pos = pos + 1;
            }
            break;
        }

        // Compression pointer: top two bits set.
        if len & 0xC0 == 0xC0 {
            if pos + 1 >= buf.len() {
                return Err(WireError::PacketTooShort);
            }
            if !followed_pointer {
                end_pos = pos + 2;
            }
            let offset = ((len & 0x3F) << 8) | buf[pos + 1] as usize;
            // Pointers must point backwards; this also breaks loops.
            if offset >= pos {
                return Err(WireError::ForwardPointer);
            }
            pos = offset;
            followed_pointer = true;
            continue;
        }

        if len > MAX_LABEL_LEN {
            return Err(WireError::LabelTooLong);
        }

        pos += 1;
        if pos + len > buf.len() {
            return Err(WireError::PacketTooShort);
        }

        total_len += len + 1;
        if total_len > MAX_NAME_LEN {
            return Err(WireError::NameTooLong);
        }

        let label =
            std::str::from_utf8(&buf[pos..pos + len]).map_err(|_| WireError::InvalidText)?;
        labels.push(label.to_string());
        pos += len;
    }

    let name = if labels.is_empty() {
        Name::root()
    } else {
        Name(labels.join(".") + ".")
    };
    Ok((name, end_pos))
}

/// Encodes a name as uncompressed wire-format labels.
fn encode_name(buf: &mut Vec<u8>, name: &Name) {
    let presentation = name.as_str().trim_end_matches('.');
    for label in presentation.split('.') {
        if label.is_empty() {
            continue;
        }
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
}

fn pack_resource(buf: &mut Vec<u8>, resource: &Resource) -> Result<(), WireError> {
    encode_name(buf, &resource.header.name);
    buf.extend_from_slice(&resource.header.rtype.to_u16().to_be_bytes());
    buf.extend_from_slice(&resource.header.class.to_be_bytes());
    buf.extend_from_slice(&resource.header.ttl.to_be_bytes());

    let len_pos = buf.len();
    buf.extend_from_slice(&[0, 0]);

    match &resource.body {
        ResourceBody::A(octets) => buf.extend_from_slice(octets),
        ResourceBody::Aaaa(octets) => buf.extend_from_slice(octets),
        ResourceBody::Cname(name) | ResourceBody::Ns(name) | ResourceBody::Ptr(name) => {
            encode_name(buf, name)
        }
        ResourceBody::Mx {
            preference,
            exchange,
        } => {
            buf.extend_from_slice(&preference.to_be_bytes());
            encode_name(buf, exchange);
        }
        ResourceBody::Soa {
            ns,
            mbox,
            serial,
            refresh,
            retry,
            expire,
            min_ttl,
        } => {
            encode_name(buf, ns);
            encode_name(buf, mbox);
            for field in [serial, refresh, retry, expire, min_ttl] {
                buf.extend_from_slice(&field.to_be_bytes());
            }
        }
        ResourceBody::Txt(strings) => {
            for s in strings {
                if s.len() > MAX_STRING_LEN {
                    return Err(WireError::StringTooLong);
                }
                buf.push(s.len() as u8);
                buf.extend_from_slice(s.as_bytes());
            }
        }
        ResourceBody::Unknown(rdata) => buf.extend_from_slice(rdata),
    }

    let rdlen = buf.len() - len_pos - 2;
    if rdlen > u16::MAX as usize {
        return Err(WireError::RdataTooLong);
    }
    buf[len_pos..len_pos + 2].copy_from_slice(&(rdlen as u16).to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn a_record(owner: &str, ttl: u32, octets: [u8; 4]) -> Resource {
        Resource {
            header: ResourceHeader {
                name: name(owner),
                rtype: RecordType::A,
                class: CLASS_IN,
                ttl,
            },
            body: ResourceBody::A(octets),
        }
    }

    #[test]
    fn test_name_validation() {
        assert_eq!(name("example.com").as_str(), "example.com.");
        assert_eq!(name("example.com.").as_str(), "example.com.");
        assert_eq!(name(".").as_str(), ".");
        assert_eq!(name("").as_str(), ".");
        assert!(name("").is_root());

        let long_label = "a".repeat(64);
        assert_eq!(Name::new(&long_label), Err(WireError::LabelTooLong));

        let long_name = ["a".repeat(63), "b".repeat(63), "c".repeat(63), "d".repeat(63)].join(".");
        assert_eq!(Name::new(&long_name), Err(WireError::NameTooLong));

        assert_eq!(Name::new("foo..bar"), Err(WireError::InvalidName));
    }

    #[test]
    fn test_name_case() {
        let upper = name("Example.COM");
        assert_eq!(upper.as_str(), "Example.COM.");
        assert_ne!(upper, name("example.com"));
        assert_eq!(upper.to_ascii_lowercase(), name("example.com"));
    }

    #[test]
    fn test_record_type_roundtrip() {
        for rt in [
            RecordType::A,
            RecordType::NS,
            RecordType::CNAME,
            RecordType::SOA,
            RecordType::PTR,
            RecordType::MX,
            RecordType::TXT,
            RecordType::AAAA,
            RecordType::Other(99),
        ] {
            assert_eq!(RecordType::from_u16(rt.to_u16()), rt);
        }
    }

    #[test]
    fn test_record_type_display() {
        assert_eq!(format!("{}", RecordType::A), "A");
        assert_eq!(format!("{}", RecordType::AAAA), "AAAA");
        assert_eq!(format!("{}", RecordType::Other(99)), "TYPE99");
    }

    #[test]
    fn test_rcode_display() {
        assert_eq!(Rcode::NO_ERROR.to_string(), "NOERROR");
        assert_eq!(Rcode::NAME_ERROR.to_string(), "NXDOMAIN");
        assert_eq!(Rcode(11).to_string(), "RCODE11");
    }

    #[test]
    fn test_header_roundtrip() {
        let msg = Message {
            header: Header {
                id: 0x1234,
                response: true,
                opcode: 2,
                authoritative: true,
                truncated: true,
                recursion_desired: true,
                recursion_available: true,
                rcode: Rcode::REFUSED,
            },
            ..Message::default()
        };
        let packed = msg.pack().unwrap();
        assert_eq!(packed.len(), 12);
        let parsed = Message::parse(&packed).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_query_roundtrip() {
        let msg = Message {
            header: Header {
                id: 7,
                recursion_desired: true,
                ..Header::default()
            },
            questions: vec![Question {
                name: name("foo.bar."),
                rtype: RecordType::A,
                class: CLASS_IN,
            }],
            ..Message::default()
        };
        let parsed = Message::parse(&msg.pack().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_response_roundtrip_all_bodies() {
        let msg = Message {
            header: Header {
                id: 9,
                response: true,
                ..Header::default()
            },
            questions: vec![Question {
                name: name("foo.bar."),
                rtype: RecordType::A,
                class: CLASS_IN,
            }],
            answers: vec![
                a_record("foo.bar.", 300, [127, 1, 1, 1]),
                Resource {
                    header: ResourceHeader {
                        name: name("foo.bar."),
                        rtype: RecordType::AAAA,
                        class: CLASS_IN,
                        ttl: 300,
                    },
                    body: ResourceBody::Aaaa([0; 16]),
                },
                Resource {
                    header: ResourceHeader {
                        name: name("foo.bar."),
                        rtype: RecordType::CNAME,
                        class: CLASS_IN,
                        ttl: 60,
                    },
                    body: ResourceBody::Cname(name("alias.bar.")),
                },
                Resource {
                    header: ResourceHeader {
                        name: name("foo.bar."),
                        rtype: RecordType::MX,
                        class: CLASS_IN,
                        ttl: 60,
                    },
                    body: ResourceBody::Mx {
                        preference: 10,
                        exchange: name("mail.bar."),
                    },
                },
                Resource {
                    header: ResourceHeader {
                        name: name("foo.bar."),
                        rtype: RecordType::TXT,
                        class: CLASS_IN,
                        ttl: 60,
                    },
                    body: ResourceBody::Txt(vec!["v=spf1 -all".to_string()]),
                },
            ],
            authorities: vec![Resource {
                header: ResourceHeader {
                    name: name("bar."),
                    rtype: RecordType::SOA,
                    class: CLASS_IN,
                    ttl: 12,
                },
                body: ResourceBody::Soa {
                    ns: name("ns1.bar."),
                    mbox: name("admin.bar."),
                    serial: 1,
                    refresh: 2,
                    retry: 3,
                    expire: 4,
                    min_ttl: 10,
                },
            }],
            additionals: vec![Resource {
                header: ResourceHeader {
                    name: name("ns1.bar."),
                    rtype: RecordType::Other(41),
                    class: CLASS_IN,
                    ttl: 0,
                },
                body: ResourceBody::Unknown(vec![1, 2, 3]),
            }],
        };
        let parsed = Message::parse(&msg.pack().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_parse_too_short() {
        assert_eq!(Message::parse(&[0u8; 5]), Err(WireError::PacketTooShort));
    }

    #[test]
    fn test_parse_truncated_question() {
        let msg = Message {
            questions: vec![Question {
                name: name("foo.bar."),
                rtype: RecordType::A,
                class: CLASS_IN,
            }],
            ..Message::default()
        };
        let packed = msg.pack().unwrap();
        assert_eq!(
            Message::parse(&packed[..packed.len() - 2]),
            Err(WireError::PacketTooShort)
        );
    }

    #[test]
    fn test_parse_compressed_name() {
        // Header with one question and one answer whose owner name is a
        // pointer back to the question name.
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0x12, 0x34]); // ID
        buf.extend_from_slice(&[0x80, 0x00]); // Flags: QR=1
        buf.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
        buf.extend_from_slice(&[0x00, 0x01]); // ANCOUNT
        buf.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
        buf.extend_from_slice(&[0x00, 0x00]); // ARCOUNT
        buf.push(3);
        buf.extend_from_slice(b"foo");
        buf.push(3);
        buf.extend_from_slice(b"bar");
        buf.push(0);
        buf.extend_from_slice(&[0x00, 0x01]); // QTYPE = A
        buf.extend_from_slice(&[0x00, 0x01]); // QCLASS = IN
        buf.extend_from_slice(&[0xC0, 12]); // pointer to offset 12
        buf.extend_from_slice(&[0x00, 0x01]); // TYPE = A
        buf.extend_from_slice(&[0x00, 0x01]); // CLASS = IN
        buf.extend_from_slice(&300u32.to_be_bytes()); // TTL
        buf.extend_from_slice(&[0x00, 0x04]); // RDLENGTH
        buf.extend_from_slice(&[127, 1, 1, 1]);

        let parsed = Message::parse(&buf).unwrap();
        assert_eq!(parsed.answers.len(), 1);
        assert_eq!(parsed.answers[0].header.name, name("foo.bar."));
        assert_eq!(parsed.answers[0].body, ResourceBody::A([127, 1, 1, 1]));
    }

    #[test]
    fn test_parse_forward_pointer_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0x12, 0x34]);
        buf.extend_from_slice(&[0x00, 0x00]);
        buf.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
        buf.extend_from_slice(&[0x00, 0x00]);
        buf.extend_from_slice(&[0x00, 0x00]);
        buf.extend_from_slice(&[0x00, 0x00]);
        buf.extend_from_slice(&[0xC0, 12]); // pointer to itself
        buf.extend_from_slice(&[0x00, 0x01]);
        buf.extend_from_slice(&[0x00, 0x01]);

        assert_eq!(Message::parse(&buf), Err(WireError::ForwardPointer));
    }

    #[test]
    fn test_parse_label_too_long() {
        let mut buf = vec![0u8; 12];
        buf[5] = 1; // QDCOUNT = 1
        buf.push(64);
        buf.extend_from_slice(&[b'x'; 64]);
        buf.push(0);
        buf.extend_from_slice(&[0x00, 0x01]);
        buf.extend_from_slice(&[0x00, 0x01]);

        assert_eq!(Message::parse(&buf), Err(WireError::LabelTooLong));
    }

    #[test]
    fn test_parse_name_too_long() {
        let mut buf = vec![0u8; 12];
        buf[5] = 1; // QDCOUNT = 1
        for _ in 0..5 {
            buf.push(63);
            buf.extend_from_slice(&[b'a'; 63]);
        }
        buf.push(0);
        buf.extend_from_slice(&[0x00, 0x01]);
        buf.extend_from_slice(&[0x00, 0x01]);

        assert_eq!(Message::parse(&buf), Err(WireError::NameTooLong));
    }

    #[test]
    fn test_parse_root_question() {
        let mut buf = vec![0u8; 12];
        buf[5] = 1; // QDCOUNT = 1
        buf.push(0); // root name
        buf.extend_from_slice(&[0x00, 0x01]);
        buf.extend_from_slice(&[0x00, 0x01]);

        let parsed = Message::parse(&buf).unwrap();
        assert!(parsed.questions[0].name.is_root());
    }

    #[test]
    fn test_pack_invalid_rcode() {
        let msg = Message {
            header: Header {
                rcode: Rcode(16),
                ..Header::default()
            },
            ..Message::default()
        };
        assert_eq!(msg.pack(), Err(WireError::InvalidRcode));
    }

    #[test]
    fn test_pack_txt_string_too_long() {
        let msg = Message {
            answers: vec![Resource {
                header: ResourceHeader {
                    name: name("foo."),
                    rtype: RecordType::TXT,
                    class: CLASS_IN,
                    ttl: 1,
                },
                body: ResourceBody::Txt(vec!["x".repeat(256)]),
            }],
            ..Message::default()
        };
        assert_eq!(msg.pack(), Err(WireError::StringTooLong));
    }

    #[test]
    fn test_parse_rdata_overrun() {
        // An A record claiming 5 bytes of RDATA.
        let mut buf = vec![0u8; 12];
        buf[2] = 0x80; // QR=1
        buf[7] = 1; // ANCOUNT = 1
        buf.push(0); // root owner
        buf.extend_from_slice(&[0x00, 0x01]); // TYPE = A
        buf.extend_from_slice(&[0x00, 0x01]); // CLASS
        buf.extend_from_slice(&300u32.to_be_bytes());
        buf.extend_from_slice(&[0x00, 0x05]); // RDLENGTH = 5
        buf.extend_from_slice(&[1, 2, 3, 4, 5]);

        assert_eq!(Message::parse(&buf), Err(WireError::RdataOverrun));
    }
}
