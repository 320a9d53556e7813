use dns_workbench::dns::{
    DNSPacket,
    enums::{DNSResourceClass, DNSResourceType, DnsOpcode, ResponseCode},
    resource::{DNSResource, DNSResourceData},
};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Query for example.com A, id 0xabcd, rd set
const EXAMPLE_QUERY: &[u8] = &[
    0xab, 0xcd, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, b'e', b'x',
    b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0x00, 0x01, 0x00, 0x01,
];

fn record(name: &str, rtype: DNSResourceType, rdata: DNSResourceData) -> DNSResource {
    DNSResource {
        labels: name.split('.').map(str::to_string).collect(),
        rtype,
        rclass: DNSResourceClass::IN,
        ttl: 300,
        rdata,
    }
}

fn every_kind() -> Vec<DNSResource> {
    vec![
        record(
            "example.com",
            DNSResourceType::A,
            DNSResourceData::A(Ipv4Addr::new(192, 0, 2, 1)),
        ),
        record(
            "example.com",
            DNSResourceType::AAAA,
            DNSResourceData::AAAA(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
        ),
        record(
            "example.com",
            DNSResourceType::NS,
            DNSResourceData::NS("ns1.example.com.".to_string()),
        ),
        record(
            "www.example.com",
            DNSResourceType::CNAME,
            DNSResourceData::CNAME("example.com.".to_string()),
        ),
        record(
            "1.2.0.192.in-addr.arpa",
            DNSResourceType::PTR,
            DNSResourceData::PTR("example.com.".to_string()),
        ),
        record(
            "example.com",
            DNSResourceType::MX,
            DNSResourceData::MX {
                preference: 10,
                exchange: "mail.example.com.".to_string(),
            },
        ),
        record(
            "example.com",
            DNSResourceType::SOA,
            DNSResourceData::SOA {
                mname: "ns1.example.com.".to_string(),
                rname: "hostmaster.example.com.".to_string(),
                serial: 2_610_171_200,
                refresh: 10000,
                retry: 2400,
                expire: 604800,
                minimum: 3600,
            },
        ),
        record(
            "example.com",
            DNSResourceType::TXT,
            DNSResourceData::TXT(vec!["v=spf1 -all".to_string(), "second".to_string()]),
        ),
        record(
            "_sip._tcp.example.com",
            DNSResourceType::SRV,
            DNSResourceData::SRV {
                priority: 10,
                weight: 60,
                port: 5060,
                target: "sip.example.com.".to_string(),
            },
        ),
        record(
            "example.com",
            DNSResourceType::CAA,
            DNSResourceData::CAA {
                flags: 128,
                tag: "issue".to_string(),
                value: "ca.example.net".to_string(),
            },
        ),
        record(
            "example.com",
            DNSResourceType::Unknown(65),
            DNSResourceData::Raw(vec![0, 1, 0]),
        ),
    ]
}

#[test]
fn test_parse_handcrafted_query() {
    let packet = DNSPacket::parse(EXAMPLE_QUERY).unwrap();

    assert_eq!(packet.header.id, 0xabcd);
    assert!(!packet.header.qr);
    assert!(packet.header.rd);
    assert_eq!(DnsOpcode::from(packet.header.opcode), DnsOpcode::Query);
    assert_eq!(packet.questions.len(), 1);
    assert_eq!(packet.questions[0].name(), "example.com.");
    assert_eq!(packet.questions[0].qtype, DNSResourceType::A);
    assert_eq!(packet.questions[0].qclass, DNSResourceClass::IN);
}

#[test]
fn test_query_encoding_matches_wire_bytes() {
    let query = DNSPacket::query(0xabcd, "example.com.", DNSResourceType::A);
    assert_eq!(query.serialize().unwrap(), EXAMPLE_QUERY);
}

#[test]
fn test_every_record_kind_decodes() {
    for compress in [false, true] {
        let mut packet = DNSPacket::query(7, "example.com", DNSResourceType::A);
        packet.header.qr = true;
        packet.header.aa = true;
        packet.compress = compress;
        packet.answers = every_kind();

        let decoded = DNSPacket::parse(&packet.serialize().unwrap()).unwrap();
        assert_eq!(decoded.header.ancount as usize, packet.answers.len());
        assert_eq!(decoded.answers, packet.answers, "compress={}", compress);
    }
}

#[test]
fn test_section_counts_follow_sections() {
    let mut packet = DNSPacket::query(8, "example.com", DNSResourceType::A);
    packet.header.qdcount = 9;
    packet.header.ancount = 9;
    packet.authorities = every_kind()[2..3].to_vec();

    let bytes = packet.serialize().unwrap();
    // QDCOUNT, ANCOUNT, NSCOUNT, ARCOUNT
    assert_eq!(&bytes[4..12], &[0, 1, 0, 0, 0, 1, 0, 0]);
}

#[test]
fn test_compression_points_at_earlier_names() {
    let mut packet = DNSPacket::query(9, "example.com", DNSResourceType::MX);
    packet.compress = true;
    packet.answers = every_kind()[5..6].to_vec();
    let bytes = packet.serialize().unwrap();

    // The answer owner repeats the question name at offset 12
    let answer_start = 12 + 13 + 4;
    assert_eq!(&bytes[answer_start..answer_start + 2], &[0xC0, 0x0C]);

    // The MX exchange ends in a pointer back to example.com
    assert_eq!(&bytes[bytes.len() - 2..], &[0xC0, 0x0C]);
}

#[test]
fn test_compression_is_case_insensitive() {
    let mut packet = DNSPacket::query(10, "Example.COM", DNSResourceType::A);
    packet.compress = true;
    packet.answers = every_kind()[..1].to_vec();
    let bytes = packet.serialize().unwrap();

    let decoded = DNSPacket::parse(&bytes).unwrap();
    assert_eq!(decoded.questions[0].name(), "Example.COM.");
    assert_eq!(decoded.answers[0].name(), "Example.COM.");
}

#[test]
fn test_pointer_loop_in_message_is_rejected() {
    let mut bytes = EXAMPLE_QUERY[..12].to_vec();
    // question name is a pointer to itself
    bytes.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01]);
    assert!(DNSPacket::parse(&bytes).is_err());
}

#[test]
fn test_pointer_past_end_is_rejected() {
    let mut bytes = EXAMPLE_QUERY[..12].to_vec();
    bytes.extend_from_slice(&[0xC0, 0xFF, 0x00, 0x01, 0x00, 0x01]);
    assert!(DNSPacket::parse(&bytes).is_err());
}

#[test]
fn test_reserved_label_bits_are_rejected() {
    let mut bytes = EXAMPLE_QUERY.to_vec();
    bytes[12] = 0x47;
    assert!(DNSPacket::parse(&bytes).is_err());
}

#[test]
fn test_count_beyond_body_is_rejected() {
    let mut bytes = EXAMPLE_QUERY.to_vec();
    // claims a second question
    bytes[5] = 2;
    assert!(DNSPacket::parse(&bytes).is_err());
}

#[test]
fn test_rcode_mapping() {
    let mut packet = DNSPacket::default();
    for code in [
        ResponseCode::NoError,
        ResponseCode::FormatError,
        ResponseCode::NameError,
        ResponseCode::NotImplemented,
    ] {
        packet.header.rcode = code.to_u8();
        let decoded = DNSPacket::parse(&packet.serialize().unwrap()).unwrap();
        assert_eq!(decoded.rcode(), Some(code));
    }
    packet.header.rcode = 11;
    assert_eq!(packet.rcode(), None);
}

#[test]
fn test_dotted_label_does_not_compress_against_split_name() {
    let mut packet = DNSPacket::query(11, "example.com", DNSResourceType::A);
    packet.questions[0].labels = vec!["example.com".to_string()];
    packet.header.qr = true;
    packet.compress = true;
    packet.answers = every_kind()[..1].to_vec();

    let decoded = DNSPacket::parse(&packet.serialize().unwrap()).unwrap();
    assert_eq!(decoded.questions[0].labels, vec!["example.com".to_string()]);
    assert_eq!(
        decoded.answers[0].labels,
        vec!["example".to_string(), "com".to_string()]
    );
}
