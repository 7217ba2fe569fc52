//! Property-based tests for path classification and event normalization

use proptest::prelude::*;

use bluez_api::{Interface, Kind, ObjectPath};
use bluez_state::{classify, classify_all, classify_as, match_path, EventNormalizer, Shape};

// ============================================================================
// Strategies
// ============================================================================

fn adapter_strategy() -> impl Strategy<Value = String> {
    (0u8..4).prop_map(|n| format!("hci{}", n))
}

fn address_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[0-9A-F]{2}", 6).prop_map(|octets| octets.join("_"))
}

fn ordinal_strategy() -> impl Strategy<Value = String> {
    "[0-9]{1,3}"
}

fn interface_strategy() -> impl Strategy<Value = Interface> {
    prop::sample::select(Interface::ALL.to_vec())
}

/// Arbitrary path strings, mostly below the root
fn any_path_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "/org/bluez(/[A-Za-z0-9_]{0,12}){0,5}",
        "/[a-z]{1,6}(/[A-Za-z0-9_]{1,8}){0,4}",
        ".{0,40}",
    ]
}

// ============================================================================
// Grammar
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Classification never panics and only yields keys for matched shapes
    #[test]
    fn prop_classification_is_total(path in any_path_strategy(), iface in interface_strategy()) {
        let path = ObjectPath::new(path);
        let matched = match_path(&path);
        let classified = classify(&path, iface);

        if matched.is_none() {
            prop_assert!(classified.is_none());
        }
        if let Some(c) = classified {
            prop_assert_eq!(c.kind.defining_interface(), iface);
            prop_assert_eq!(classify_as(&path, c.kind), Some(c.key));
        }
    }

    /// Device paths yield the address as key for every address-keyed kind
    #[test]
    fn prop_device_keys_are_addresses(adapter in adapter_strategy(), address in address_strategy()) {
        let path = ObjectPath::new(format!("/org/bluez/{}/dev_{}", adapter, address));

        for kind in [Kind::Device, Kind::Network, Kind::MediaControl] {
            let key = classify_as(&path, kind);
            prop_assert_eq!(key.as_ref().map(|k| k.as_str()), Some(address.as_str()));
        }
        prop_assert!(classify_as(&path, Kind::Adapter).is_none());
    }

    /// Player-rooted keys keep the ordinals verbatim
    #[test]
    fn prop_player_keys_are_composite(
        adapter in adapter_strategy(),
        address in address_strategy(),
        player in ordinal_strategy(),
        item in ordinal_strategy(),
    ) {
        let base = format!("/org/bluez/{}/dev_{}/player{}", adapter, address, player);

        let player_key = classify_as(&ObjectPath::new(base.clone()), Kind::MediaPlayer).unwrap();
        prop_assert_eq!(player_key.as_str(), format!("{}.player{}", address, player));

        let item_path = ObjectPath::new(format!("{}/NowPlaying/item{}", base, item));
        prop_assert_eq!(match_path(&item_path).map(|m| m.shape), Some(Shape::NowPlayingItem));
        let item_key = classify_as(&item_path, Kind::MediaItem).unwrap();
        prop_assert_eq!(item_key.as_str(), format!("{}.player{}.item{}", address, player, item));

        let fs_path = ObjectPath::new(format!("{}/Filesystem", base));
        let fs = classify_all(&fs_path, ["org.bluez.MediaItem1"]);
        prop_assert_eq!(fs.len(), 1);
        prop_assert_eq!(fs[0].kind, Kind::Filesystem);
        prop_assert_eq!(fs[0].key.as_str(), player_key.as_str());
    }

    /// Address-less children are keyed by their adapter
    #[test]
    fn prop_adapter_owned_transports(adapter in adapter_strategy(), fd in ordinal_strategy()) {
        let path = ObjectPath::new(format!("/org/bluez/{}/fd{}", adapter, fd));
        let key = classify_as(&path, Kind::MediaTransport).unwrap();
        prop_assert_eq!(key.as_str(), format!("{}.fd{}", adapter, fd));
    }

    /// Segments outside the grammar never classify
    #[test]
    fn prop_unknown_children_are_rejected(
        adapter in adapter_strategy(),
        address in address_strategy(),
        segment in "[a-z]{1,8}[0-9]{0,3}",
    ) {
        prop_assume!(!segment.starts_with("fd") && !segment.starts_with("player"));
        let path = ObjectPath::new(format!("/org/bluez/{}/dev_{}/{}", adapter, address, segment));

        prop_assert!(match_path(&path).is_none());
        let names: Vec<&str> = Interface::ALL.iter().map(|i| i.name()).collect();
        prop_assert!(classify_all(&path, names).is_empty());
    }

    /// Only the eight recognized interfaces produce a domain name
    #[test]
    fn prop_domain_names(name in "org\\.bluez\\.[A-Za-z]{1,16}[0-9]?") {
        match Interface::from_name(&name) {
            Some(iface) => prop_assert_eq!(EventNormalizer::domain_name(&name), Some(iface.kind().name())),
            None => prop_assert!(EventNormalizer::domain_name(&name).is_none()),
        }
    }
}
