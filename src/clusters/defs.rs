//! Cluster, command and attribute identifiers used by the built-in
//! decoders, demos and tests. Not a complete data model - callers working
//! with other clusters pass their own ids.

pub const CLUSTER_ID_ON_OFF: u32 = 0x0006;
pub const CLUSTER_ON_OFF_ATTR_ID_ONOFF: u32 = 0x0000;
pub const CLUSTER_ON_OFF_CMD_ID_OFF: u32 = 0x00;
pub const CLUSTER_ON_OFF_CMD_ID_ON: u32 = 0x01;
pub const CLUSTER_ON_OFF_CMD_ID_TOGGLE: u32 = 0x02;

pub const CLUSTER_ID_LEVEL_CONTROL: u32 = 0x0008;
pub const CLUSTER_LEVEL_CONTROL_ATTR_ID_CURRENTLEVEL: u32 = 0x0000;
pub const CLUSTER_LEVEL_CONTROL_CMD_ID_MOVETOLEVEL: u32 = 0x00;

pub const CLUSTER_ID_SWITCH: u32 = 0x003B;
pub const CLUSTER_SWITCH_EVENT_ID_INITIAL_PRESS: u32 = 0x01;

pub const CLUSTER_ID_GROUP_KEY_MANAGEMENT: u32 = 0x003F;
pub const CLUSTER_GROUP_KEY_MANAGEMENT_CMD_ID_KEYSET_READ: u32 = 0x01;
pub const CLUSTER_GROUP_KEY_MANAGEMENT_CMD_ID_KEYSET_READ_RESPONSE: u32 = 0x02;

pub const CLUSTER_ID_DOOR_LOCK: u32 = 0x0101;
pub const CLUSTER_DOOR_LOCK_CMD_ID_GETUSER: u32 = 0x1B;
pub const CLUSTER_DOOR_LOCK_CMD_ID_GETUSER_RESPONSE: u32 = 0x1C;
