//! Object path grammar
//!
//! Paths below `/org/bluez` come in six shapes:
//!
//! | Shape            | Segments below the root                                  |
//! |------------------|----------------------------------------------------------|
//! | `Device`         | `<adapter>` or `<adapter>/dev_<addr>`                    |
//! | `Fd`             | `<adapter>[/dev_<addr>]/fd<N>`                           |
//! | `Filesystem`     | `<adapter>[/dev_<addr>]/player<N>/Filesystem`            |
//! | `NowPlaying`     | `<adapter>[/dev_<addr>]/player<N>/NowPlaying`            |
//! | `NowPlayingItem` | `<adapter>[/dev_<addr>]/player<N>/NowPlaying/item<M>`    |
//! | `Player`         | `<adapter>[/dev_<addr>]/player<N>`                       |
//!
//! A shape alone does not decide the kind: the device shape is an adapter
//! for `Adapter1` and a device for `Device1`. [`RULES`] pairs each kind
//! with the shape it must be found at.

use bluez_api::{EntityKey, Interface, Kind, ObjectPath};

/// Grammar shape of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Device,
    Fd,
    Filesystem,
    NowPlaying,
    NowPlayingItem,
    Player,
}

/// Segments captured from a path that matched one shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch<'a> {
    pub shape: Shape,
    pub adapter: &'a str,
    pub address: Option<&'a str>,
    /// Player ordinal for player-rooted shapes, fd ordinal for `Fd`
    pub ordinal: Option<&'a str>,
    pub item: Option<&'a str>,
}

impl PathMatch<'_> {
    /// Owner segment of composite keys: the address, or the adapter when absent
    pub fn owner(&self) -> &str {
        self.address.unwrap_or(self.adapter)
    }
}

/// A (kind, key) pair derived from a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Classification {
    pub kind: Kind,
    pub key: EntityKey,
}

/// A kind and the shape its entries live at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub kind: Kind,
    pub shape: Shape,
}

/// Every kind/shape pairing the tracker recognizes
pub const RULES: [Rule; 9] = [
    Rule { kind: Kind::Adapter, shape: Shape::Device },
    Rule { kind: Kind::Device, shape: Shape::Device },
    Rule { kind: Kind::Network, shape: Shape::Device },
    Rule { kind: Kind::MediaControl, shape: Shape::Device },
    Rule { kind: Kind::MediaPlayer, shape: Shape::Player },
    Rule { kind: Kind::MediaTransport, shape: Shape::Fd },
    Rule { kind: Kind::Filesystem, shape: Shape::Filesystem },
    Rule { kind: Kind::MediaItem, shape: Shape::NowPlaying },
    Rule { kind: Kind::MediaItem, shape: Shape::NowPlayingItem },
];

fn is_word(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Digits following `prefix`, kept verbatim
fn ordinal<'a>(segment: &'a str, prefix: &str) -> Option<&'a str> {
    segment
        .strip_prefix(prefix)
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Match a path against the six shapes
///
/// Returns `None` for paths outside the root and for anything that does not
/// fit exactly one shape.
pub fn match_path(path: &ObjectPath) -> Option<PathMatch<'_>> {
    let mut segments = path.relative_to_root()?.split('/').peekable();

    let adapter = segments.next().filter(|s| is_word(s))?;
    let address = match segments.peek().copied() {
        Some(segment) => match segment.strip_prefix("dev_") {
            Some(addr) if is_word(addr) => {
                segments.next();
                Some(addr)
            }
            _ => None,
        },
        None => None,
    };

    let rest: Vec<&str> = segments.collect();
    let (shape, ordinal, item) = match *rest.as_slice() {
        [] => (Shape::Device, None, None),
        [fd] => match (self::ordinal(fd, "fd"), self::ordinal(fd, "player")) {
            (Some(n), _) => (Shape::Fd, Some(n), None),
            (None, Some(n)) => (Shape::Player, Some(n), None),
            (None, None) => return None,
        },
        [player, "Filesystem"] => (Shape::Filesystem, Some(self::ordinal(player, "player")?), None),
        [player, "NowPlaying"] => (Shape::NowPlaying, Some(self::ordinal(player, "player")?), None),
        [player, "NowPlaying", item] => (
            Shape::NowPlayingItem,
            Some(self::ordinal(player, "player")?),
            Some(self::ordinal(item, "item")?),
        ),
        _ => return None,
    };

    Some(PathMatch {
        shape,
        adapter,
        address,
        ordinal,
        item,
    })
}

/// Key of an entry of `kind` at a matched path
///
/// Adapters live at address-less device paths; devices, networks and media
/// controls need an address.
fn key_for(kind: Kind, m: &PathMatch<'_>) -> Option<EntityKey> {
    let rule_matches = RULES
        .iter()
        .any(|rule| rule.kind == kind && rule.shape == m.shape);
    if !rule_matches {
        return None;
    }

    let key = match kind {
        Kind::Adapter => match m.address {
            None => m.adapter.to_string(),
            Some(_) => return None,
        },
        Kind::Device | Kind::Network | Kind::MediaControl => m.address?.to_string(),
        Kind::MediaTransport => format!("{}.fd{}", m.owner(), m.ordinal?),
        Kind::MediaPlayer | Kind::Filesystem => format!("{}.player{}", m.owner(), m.ordinal?),
        Kind::MediaItem => match m.item {
            Some(item) => format!("{}.player{}.item{}", m.owner(), m.ordinal?, item),
            None => format!("{}.player{}", m.owner(), m.ordinal?),
        },
    };

    Some(EntityKey::address(&key))
}

/// Classify a path as an entry of `kind`
pub fn classify_as(path: &ObjectPath, kind: Kind) -> Option<EntityKey> {
    key_for(kind, &match_path(path)?)
}

/// Classify a path for the entry `interface` defines there
///
/// `MediaItem1` defines a `Filesystem` at a filesystem path and a
/// `MediaItem` at a now-playing path.
pub fn classify(path: &ObjectPath, interface: Interface) -> Option<Classification> {
    classify_match(&match_path(path)?, interface)
}

fn classify_match(m: &PathMatch<'_>, interface: Interface) -> Option<Classification> {
    RULES
        .iter()
        .filter(|rule| rule.shape == m.shape && rule.kind.defining_interface() == interface)
        .find_map(|rule| {
            key_for(rule.kind, m).map(|key| Classification {
                kind: rule.kind,
                key,
            })
        })
}

/// Classify every recognized interface name announced at `path`
///
/// Unrecognized names and paths are skipped. The result is in the order of
/// `names`.
pub fn classify_all<'n, I>(path: &ObjectPath, names: I) -> Vec<Classification>
where
    I: IntoIterator<Item = &'n str>,
{
    let Some(m) = match_path(path) else {
        return Vec::new();
    };
    names
        .into_iter()
        .filter_map(Interface::from_name)
        .filter_map(|iface| classify_match(&m, iface))
        .collect()
}
