// src/version/mod.rs

//! Version handling and constraint satisfaction for package dependencies
//!
//! Implements pacman's version ordering (`[epoch:]version[-release]`) and
//! the `name[<op><version>]` dependency syntax used by PKGBUILDs and the
//! AUR RPC interface.

use std::cmp::Ordering;
use std::fmt;

/// A parsed pacman version with epoch, version, and release components
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PkgVersion {
    pub epoch: String,
    pub version: String,
    pub release: Option<String>,
}

impl PkgVersion {
    /// Parse a pacman version string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch="0", version="1.2.3", release=None
    /// - "2:1.2.3" → epoch="2", version="1.2.3", release=None
    /// - "1.2.3-4" → epoch="0", version="1.2.3", release=Some("4")
    /// - "r123.abcdef-1" → version="r123.abcdef", release=Some("1")
    pub fn parse(s: &str) -> Self {
        let digits = s.bytes().take_while(u8::is_ascii_digit).count();
        let (epoch, rest) = if s.as_bytes().get(digits) == Some(&b':') {
            let epoch = if digits == 0 { "0" } else { &s[..digits] };
            (epoch.to_string(), &s[digits + 1..])
        } else {
            ("0".to_string(), s)
        };

        // The release is everything after the last dash
        let (version, release) = match rest.rfind('-') {
            Some(pos) => (rest[..pos].to_string(), Some(rest[pos + 1..].to_string())),
            None => (rest.to_string(), None),
        };

        Self {
            epoch,
            version,
            release,
        }
    }

    /// Compare two versions the way pacman does
    ///
    /// Releases only take part when both sides carry one, so `1.0` equals
    /// `1.0-3`.
    pub fn compare(&self, other: &PkgVersion) -> Ordering {
        segment_cmp(&self.epoch, &other.epoch)
            .then_with(|| segment_cmp(&self.version, &other.version))
            .then_with(|| match (&self.release, &other.release) {
                (Some(a), Some(b)) => segment_cmp(a, b),
                _ => Ordering::Equal,
            })
    }
}

impl fmt::Display for PkgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != "0" {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

/// Compare two full version strings
pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    PkgVersion::parse(a).compare(&PkgVersion::parse(b))
}

/// Segment-wise comparison of a single version component
///
/// Alphanumeric runs are compared pairwise; numeric runs compare by value
/// and always beat alphabetic runs. A leftover alphabetic tail loses to
/// the end of the string (`1.0a < 1.0`), any other leftover wins.
fn segment_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let one = a.as_bytes();
    let two = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    while i < one.len() && j < two.len() {
        let sep_start_i = i;
        let sep_start_j = j;
        while i < one.len() && !one[i].is_ascii_alphanumeric() {
            i += 1;
        }
        while j < two.len() && !two[j].is_ascii_alphanumeric() {
            j += 1;
        }

        if i >= one.len() || j >= two.len() {
            break;
        }

        // Differing separator runs decide on their own
        let sep_one = i - sep_start_i;
        let sep_two = j - sep_start_j;
        if sep_one != sep_two {
            return sep_one.cmp(&sep_two);
        }

        let numeric = one[i].is_ascii_digit();
        let take = |bytes: &[u8], start: usize| {
            let mut end = start;
            while end < bytes.len()
                && if numeric {
                    bytes[end].is_ascii_digit()
                } else {
                    bytes[end].is_ascii_alphabetic()
                }
            {
                end += 1;
            }
            end
        };
        let end_i = take(one, i);
        let end_j = take(two, j);

        if end_j == j {
            // Segment kinds differ: numeric is newer
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let mut seg_one = &one[i..end_i];
        let mut seg_two = &two[j..end_j];

        if numeric {
            while seg_one.len() > 1 && seg_one[0] == b'0' {
                seg_one = &seg_one[1..];
            }
            while seg_two.len() > 1 && seg_two[0] == b'0' {
                seg_two = &seg_two[1..];
            }
            match seg_one.len().cmp(&seg_two.len()) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        match seg_one.cmp(seg_two) {
            Ordering::Equal => {}
            ord => return ord,
        }

        i = end_i;
        j = end_j;
    }

    let rest_one = &one[i.min(one.len())..];
    let rest_two = &two[j.min(two.len())..];
    if rest_one.is_empty() && rest_two.is_empty() {
        return Ordering::Equal;
    }

    let one_alpha = rest_one.first().is_some_and(u8::is_ascii_alphabetic);
    let two_alpha = rest_two.first().is_some_and(u8::is_ascii_alphabetic);
    if (rest_one.is_empty() && !two_alpha) || one_alpha {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Comparison operator of a versioned dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepOp {
    /// Any version is acceptable
    Any,
    Less,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    Greater,
}

impl DepOp {
    fn as_str(self) -> &'static str {
        match self {
            DepOp::Any => "",
            DepOp::Less => "<",
            DepOp::LessOrEqual => "<=",
            DepOp::Equal => "=",
            DepOp::GreaterOrEqual => ">=",
            DepOp::Greater => ">",
        }
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            DepOp::Any => true,
            DepOp::Less => ord == Ordering::Less,
            DepOp::LessOrEqual => ord != Ordering::Greater,
            DepOp::Equal => ord == Ordering::Equal,
            DepOp::GreaterOrEqual => ord != Ordering::Less,
            DepOp::Greater => ord == Ordering::Greater,
        }
    }
}

/// A dependency string split into name, operator and version
///
/// Examples:
/// - "glibc" → name="glibc", op=Any
/// - "bar>=1.0" → name="bar", op=GreaterOrEqual, version="1.0"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepSpec {
    pub name: String,
    pub op: DepOp,
    pub version: Option<String>,
}

impl DepSpec {
    /// Parse a dependency string
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        let Some(pos) = s.find(['<', '>', '=']) else {
            return Self {
                name: s.to_string(),
                op: DepOp::Any,
                version: None,
            };
        };

        let (name, rest) = s.split_at(pos);
        let (op, version) = if let Some(v) = rest.strip_prefix(">=") {
            (DepOp::GreaterOrEqual, v)
        } else if let Some(v) = rest.strip_prefix("<=") {
            (DepOp::LessOrEqual, v)
        } else if let Some(v) = rest.strip_prefix('>') {
            (DepOp::Greater, v)
        } else if let Some(v) = rest.strip_prefix('<') {
            (DepOp::Less, v)
        } else {
            (DepOp::Equal, rest.trim_start_matches('='))
        };

        Self {
            name: name.to_string(),
            op,
            version: Some(version.trim().to_string()),
        }
    }

    /// Check whether a package with this version satisfies the constraint
    pub fn satisfied_by_version(&self, version: &str) -> bool {
        match &self.version {
            None => true,
            Some(wanted) => self.op.accepts(vercmp(version, wanted)),
        }
    }

    /// Check whether a package (by name, version and provides) satisfies this dependency
    ///
    /// An unversioned provide only satisfies an unversioned dependency.
    pub fn is_satisfied_by(&self, name: &str, version: &str, provides: &[String]) -> bool {
        if name == self.name && self.satisfied_by_version(version) {
            return true;
        }

        provides.iter().any(|provide| {
            let provided = DepSpec::parse(provide);
            if provided.name != self.name {
                return false;
            }
            match (&provided.version, &self.version) {
                (_, None) => true,
                (None, Some(_)) => false,
                (Some(v), Some(_)) => self.satisfied_by_version(v),
            }
        })
    }
}

impl fmt::Display for DepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(ref version) = self.version {
            write!(f, "{}{}", self.op.as_str(), version)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkg_version_parse_simple() {
        let v = PkgVersion::parse("1.2.3");
        assert_eq!(v.epoch, "0");
        assert_eq!(v.version, "1.2.3");
        assert_eq!(v.release, None);
    }

    #[test]
    fn test_pkg_version_parse_full() {
        let v = PkgVersion::parse("1:2.3.4-5");
        assert_eq!(v.epoch, "1");
        assert_eq!(v.version, "2.3.4");
        assert_eq!(v.release, Some("5".to_string()));
        assert_eq!(v.to_string(), "1:2.3.4-5");
    }

    #[test]
    fn test_vercmp_basic_ordering() {
        assert_eq!(vercmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(vercmp("1.0", "1.1"), Ordering::Less);
        assert_eq!(vercmp("1.10", "1.9"), Ordering::Greater);
        assert_eq!(vercmp("1.0.0", "1.0"), Ordering::Greater);
        assert_eq!(vercmp("1.01", "1.1"), Ordering::Equal);
    }

    #[test]
    fn test_vercmp_alpha_suffixes() {
        assert_eq!(vercmp("1.0a", "1.0"), Ordering::Less);
        assert_eq!(vercmp("1.0a", "1.0b"), Ordering::Less);
        assert_eq!(vercmp("1.0alpha", "1.0.1"), Ordering::Less);
        assert_eq!(vercmp("1.0", "1.0a"), Ordering::Greater);
        assert_eq!(vercmp("1.0", "1.0.a"), Ordering::Less);
    }

    #[test]
    fn test_vercmp_epoch_wins() {
        assert_eq!(vercmp("1:1.0-1", "2.0-1"), Ordering::Greater);
        assert_eq!(vercmp("2.0-1", "1:0.1-1"), Ordering::Less);
    }

    #[test]
    fn test_vercmp_release_only_when_both_present() {
        assert_eq!(vercmp("1.0-1", "1.0-2"), Ordering::Less);
        assert_eq!(vercmp("1.0", "1.0-2"), Ordering::Equal);
    }

    #[test]
    fn test_vercmp_vcs_style_versions() {
        assert_eq!(vercmp("r120.abc123-1", "r98.fff000-1"), Ordering::Greater);
        assert_eq!(vercmp("0.1.r5.g1234-1", "0.1.r12.gabcd-1"), Ordering::Less);
    }

    #[test]
    fn test_dep_spec_parse_unversioned() {
        let dep = DepSpec::parse("glibc");
        assert_eq!(dep.name, "glibc");
        assert_eq!(dep.op, DepOp::Any);
        assert_eq!(dep.version, None);
    }

    #[test]
    fn test_dep_spec_parse_operators() {
        let cases = [
            ("bar>=1.0", DepOp::GreaterOrEqual),
            ("bar<=1.0", DepOp::LessOrEqual),
            ("bar>1.0", DepOp::Greater),
            ("bar<1.0", DepOp::Less),
            ("bar=1.0", DepOp::Equal),
        ];
        for (input, op) in cases {
            let dep = DepSpec::parse(input);
            assert_eq!(dep.name, "bar", "{input}");
            assert_eq!(dep.op, op, "{input}");
            assert_eq!(dep.version.as_deref(), Some("1.0"), "{input}");
            assert_eq!(dep.to_string(), input);
        }
    }

    #[test]
    fn test_dep_spec_satisfaction() {
        let dep = DepSpec::parse("bar>=1.0");
        assert!(dep.is_satisfied_by("bar", "1.2-1", &[]));
        assert!(!dep.is_satisfied_by("bar", "0.9-1", &[]));
        assert!(!dep.is_satisfied_by("baz", "1.2-1", &[]));
    }

    #[test]
    fn test_dep_spec_satisfied_by_provides() {
        let provides = vec!["libthing=2.0".to_string(), "other".to_string()];
        assert!(DepSpec::parse("libthing").is_satisfied_by("thing-git", "r1-1", &provides));
        assert!(DepSpec::parse("libthing>=1.5").is_satisfied_by("thing-git", "r1-1", &provides));
        assert!(!DepSpec::parse("libthing>=3").is_satisfied_by("thing-git", "r1-1", &provides));
        // An unversioned provide cannot satisfy a versioned dependency
        assert!(!DepSpec::parse("other>=1").is_satisfied_by("thing-git", "r1-1", &provides));
    }
}
