pub const KEY_FAN_MODE: &str = "fan_mode";
pub const KEY_AC_MODE: &str = "ac_mode";
pub const KEY_COOL_TO: &str = "cool_to";
pub const KEY_HEAT_TO: &str = "heat_to";
pub const KEY_HYST_TRIGGER: &str = "hyst_trigger";
pub const KEY_HYST_RELEASE: &str = "hyst_release";

pub const KEY_FILTER_SEC: &str = "filter_sec";
pub const KEY_COOL_SEC: &str = "cool_sec";
pub const KEY_HEAT_SEC: &str = "heat_sec";

pub const KEY_EXT_SERVER: &str = "ext_server";
pub const KEY_EXT_READ_SEC: &str = "ext_read_sec";

pub const KEY_ID: &str = "id";
pub const KEY_TAG: &str = "tag";
