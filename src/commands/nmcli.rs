//! Command lines for the host's network tooling.
//!
//! Line-oriented nmcli output is turned into JSON by piping through `jq`;
//! [`JQ_PROBE`] detects whether that adapter is present at all. Command
//! strings double as cache keys, so queries must be byte-stable.

/// Connected wifi/ethernet devices as a JSON array of
/// `{TYPE, STATE, CONNECTION}` objects.
pub const CONNECTION_STATUS: &str = r#"nmcli -t -f TYPE,STATE,CONNECTION device | grep connected | jq -sR 'split("\n") | map(select(length > 0)) | map(split(":")) | map({TYPE: .[0], STATE: .[1], CONNECTION: .[2]}) | map(select(.TYPE == "wifi" or .TYPE == "ethernet"))'"#;

/// Visible Wi-Fi networks as a JSON array of
/// `{network, mode, channel, rate, signal, bars, security}` objects.
pub const WIFI_NETWORKS: &str = r#"nmcli -f ssid,mode,chan,rate,signal,bars,security -t dev wifi | jq -sR 'split("\n") | map(split(":")) | map({"network": .[0], "mode": .[1], "channel": .[2], "rate": .[3], "signal": .[4], "bars": .[5], "security": .[6]})'"#;

/// First private IPv4 address of the host, one line or empty.
pub const IP_ADDRESS: &str = r#"hostname -I | tr ' ' '\n' | grep -E '^(192\.168\.|10\.|172\.(1[6-9]|2[0-9]|3[01]))' | head -n 1"#;

/// Hostname on the first line, kernel identification on the second.
pub const DEVICE_INFO: &str = "hostname && uname -srm";

/// Health-check for the structured-data extraction adapter.
pub const JQ_PROBE: &str = "which jq";

/// Radio off/on cycle used as the primary disconnect path.
pub const DISCONNECT_RADIO: &str = "nmcli radio wifi off && sleep 1 && nmcli radio wifi on";

/// Connected wifi devices, used by the disconnect fallback path.
pub const CONNECTED_WIFI_DEVICES: &str =
    "nmcli -t -f DEVICE,TYPE,STATE device | grep wifi | grep connected";

/// Escape single quotes so a value can be embedded in a `'…'` shell string.
pub fn escape_single_quotes(value: &str) -> String {
    value.replace('\'', "\\'")
}

/// Connect to a Wi-Fi network. The caller must not log the result verbatim.
pub fn connect_wifi(ssid: &str, password: &str) -> String {
    format!(
        "nmcli device wifi connect '{}' password '{}'",
        escape_single_quotes(ssid),
        escape_single_quotes(password)
    )
}

/// Disconnect a specific device, the fallback when the radio cycle fails.
pub fn disconnect_device(device: &str) -> String {
    format!("nmcli device disconnect {device}")
}

/// Trigger a Wi-Fi rescan, waiting up to `wait_secs` for completion.
pub fn rescan(wait_secs: u32) -> String {
    format!("nmcli --wait {wait_secs} dev wifi rescan")
}
