// Diesel table definition for the devices registry.

diesel::table! {
    devices (id) {
        id -> Integer,
        ip -> Text,
        hostname -> Nullable<Text>,
        alias -> Nullable<Text>,
        rtt -> Nullable<Integer>,
        last_seen -> Nullable<Timestamp>,
    }
}
