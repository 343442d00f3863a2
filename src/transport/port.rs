//! Port-range parsing: `"port"` or `"low:high"`.

use crate::core::{NetError, NetResult};

/// Parse a port spec into an inclusive `(low, high)` pair.
///
/// A single port `p` yields `(p, p)`. Both bounds must be base-10 integers in
/// `[0, 65535]` with `low <= high`; anything else is `InvalidPortRange`.
pub fn parse_port_range(spec: &str) -> NetResult<(u16, u16)> {
    let invalid = || NetError::InvalidPortRange(spec.to_string());

    let (low, high) = match spec.split_once(':') {
        Some((low, high)) => (
            low.parse::<u16>().map_err(|_| invalid())?,
            high.parse::<u16>().map_err(|_| invalid())?,
        ),
        None => {
            let port = spec.parse::<u16>().map_err(|_| invalid())?;
            (port, port)
        }
    };

    if low > high {
        return Err(invalid());
    }
    Ok((low, high))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_port() {
        assert_eq!(parse_port_range("60001").unwrap(), (60001, 60001));
        assert_eq!(parse_port_range("0").unwrap(), (0, 0));
    }

    #[test]
    fn range() {
        assert_eq!(parse_port_range("60001:60999").unwrap(), (60001, 60999));
        assert_eq!(parse_port_range("5:5").unwrap(), (5, 5));
    }

    #[test]
    fn rejects_malformed() {
        for spec in ["", ":", "1:", ":2", "a", "1:b", "1:2:3", "-1", "1 :2", "0x10"] {
            assert!(
                matches!(parse_port_range(spec), Err(NetError::InvalidPortRange(_))),
                "accepted {spec:?}"
            );
        }
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(parse_port_range("65536").is_err());
        assert!(parse_port_range("1:70000").is_err());
    }

    #[test]
    fn rejects_inverted() {
        assert!(parse_port_range("60999:60001").is_err());
    }

    proptest! {
        #[test]
        fn roundtrips_ordered_pairs(a: u16, b: u16) {
            let (low, high) = (a.min(b), a.max(b));
            prop_assert_eq!(parse_port_range(&format!("{low}:{high}")).unwrap(), (low, high));
        }

        #[test]
        fn roundtrips_single_ports(p: u16) {
            prop_assert_eq!(parse_port_range(&p.to_string()).unwrap(), (p, p));
        }

        #[test]
        fn inverted_pairs_fail(a: u16, b: u16) {
            prop_assume!(a != b);
            let (low, high) = (a.min(b), a.max(b));
            let inverted = format!("{}:{}", high, low);
            prop_assert!(parse_port_range(&inverted).is_err());
        }
    }
}
