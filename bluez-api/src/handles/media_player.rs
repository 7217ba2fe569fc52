use crate::macros::define_interface_handle;

define_interface_handle! {
    /// Remote media player (`org.bluez.MediaPlayer1`)
    ///
    /// `Type` is exposed as `player_type`.
    handle: MediaPlayer,
    interface: MediaPlayer,
    methods: {
        play: "Play",
        pause: "Pause",
        stop: "Stop",
        next: "Next",
        previous: "Previous",
        fast_forward: "FastForward",
        rewind: "Rewind",
    },
    read_only: {
        browsable: "Browsable",
        device: "Device",
        name: "Name",
        playlist: "Playlist",
        position: "Position",
        searchable: "Searchable",
        status: "Status",
        subtype: "Subtype",
        track: "Track",
        player_type: "Type",
    },
    read_write: {
        equalizer: "Equalizer",
        repeat: "Repeat",
        scan: "Scan",
        shuffle: "Shuffle",
    },
}
