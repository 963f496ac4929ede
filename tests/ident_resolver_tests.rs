//! Identifier resolver: shape-driven resolution for every module path.

use assert_matches::assert_matches;
use ocpi_node::ident::{self, PathError, SegmentKind};

#[test]
fn every_scoped_address_shares_the_party_parsers() {
    let (party, tariff_id) = ident::tariff_address("se", "aaa", "WINTER-2024").unwrap();
    assert_eq!(party.country_code.as_str(), "SE");
    assert_eq!(party.party_id.as_str(), "AAA");
    assert_eq!(tariff_id.as_str(), "WINTER-2024");

    let (_, session_id) = ident::session_address("SE", "AAA", "abc-123").unwrap();
    assert_eq!(session_id.as_str(), "abc-123");

    let (_, cdr_id) = ident::cdr_address("SE", "AAA", "cdr:2024:01").unwrap();
    assert_eq!(cdr_id.as_str(), "cdr:2024:01");

    let (_, uid) = ident::token_address("SE", "AAA", "012345678").unwrap();
    assert_eq!(uid.as_str(), "012345678");
}

#[test]
fn country_code_format_is_enforced() {
    for bad in ["D", "DEU", "D1", "++"] {
        let err = ident::party_ref(bad, "ABC").unwrap_err();
        assert_matches!(
            err,
            PathError::Malformed {
                segment: "country_code",
                index: 0,
                ..
            }
        );
    }
}

#[test]
fn party_id_format_is_enforced() {
    for bad in ["AB", "ABCD", "A_C", ""] {
        let err = ident::party_ref("DE", bad).unwrap_err();
        assert_matches!(
            err,
            PathError::Malformed {
                segment: "party_id",
                index: 1,
                ..
            }
        );
    }
}

#[test]
fn failures_report_the_leftmost_bad_segment_only() {
    // Both the evse uid and the connector id are malformed; only the evse
    // uid (the leftmost) is reported.
    let err = ident::connector_address("DE", "ABC", "LOC1", "", "").unwrap_err();
    assert_matches!(
        err,
        PathError::Malformed {
            segment: "evse_uid",
            index: 3,
            ..
        }
    );
}

#[test]
fn arity_is_checked_before_any_segment_parse() {
    let err = ident::resolve(
        &[
            SegmentKind::CountryCode,
            SegmentKind::PartyId,
            SegmentKind::SessionId,
        ],
        &["not-a-country"],
    )
    .unwrap_err();
    assert_eq!(
        err,
        PathError::Insufficient {
            expected: 3,
            found: 1
        }
    );

    let err = ident::resolve(
        &[SegmentKind::TokenUid],
        &["UID1", "extra"],
    )
    .unwrap_err();
    assert_eq!(
        err,
        PathError::Trailing {
            expected: 1,
            found: 2
        }
    );
}

#[test]
fn bare_token_uid_accepts_legacy_shape() {
    let uid = ident::bare_token_uid("DEADBEEF").unwrap();
    assert_eq!(uid.as_str(), "DEADBEEF");
    assert!(ident::bare_token_uid(&"x".repeat(37)).is_err());
}

#[test]
fn id_charset_rejects_path_noise() {
    for bad in ["a b", "a/b", "a%2Fb", "a\u{e9}"] {
        assert!(ident::location_address("DE", "ABC", bad).is_err(), "{bad:?}");
    }
}
