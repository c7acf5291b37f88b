//! Helpers for DICOM UID values, which are encoded as UI-VR text: ASCII
//! digits and dots, padded to an even length with a single trailing NUL.

/// Trim a decoded UID value of its trailing padding (NUL or space).
pub fn trim_uid(s: &str) -> &str {
    s.trim_end_matches(['\0', ' '])
}

/// Pad a UID to an even byte length with a single trailing NUL, as
/// required for its UI-VR wire encoding.
pub fn pad_uid(uid: &str) -> String {
    if uid.len() % 2 == 0 {
        uid.to_string()
    } else {
        let mut s = String::with_capacity(uid.len() + 1);
        s.push_str(uid);
        s.push('\0');
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_odd_length_uids() {
        assert_eq!(pad_uid("1.2.3").len() % 2, 0);
        assert_eq!(pad_uid("1.2").len() % 2, 0);
    }

    #[test]
    fn trims_padding() {
        assert_eq!(trim_uid("1.2.3\0"), "1.2.3");
        assert_eq!(trim_uid("1.2.3 "), "1.2.3");
    }
}
