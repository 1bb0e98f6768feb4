//! Canonical structured event names used across `fog-message-bus`.

// In-process transport events.
pub const LISTENER_DISPATCH_CLOSED: &str = "listener_dispatch_closed";
pub const BROKER_SERVER_START: &str = "broker_server_start";
pub const BROKER_SERVER_STOP: &str = "broker_server_stop";
pub const BROKER_MEMORY_LIMIT_SET: &str = "broker_memory_limit_set";
pub const BROKER_CHANNEL_DISCARDED: &str = "broker_channel_discarded";
pub const BRIDGE_RELAY: &str = "bridge_relay";
pub const BRIDGE_PRODUCER_MISSING: &str = "bridge_producer_missing";

// Archive events.
pub const ARCHIVE_EVICT: &str = "archive_evict";
pub const ARCHIVE_CHECKSUM_MISMATCH: &str = "archive_checksum_mismatch";
pub const ARCHIVE_DECODE_FAILED: &str = "archive_decode_failed";

// Publisher events.
pub const PUBLISH_SEND: &str = "publish_send";
pub const PUBLISH_SEND_FAILED: &str = "publish_send_failed";
pub const PUBLISH_ARCHIVE_FAILED: &str = "publish_archive_failed";
pub const PUBLISHER_ROUTE_UPDATE: &str = "publisher_route_update";
pub const PUBLISHER_BRIDGE_ENABLE_OK: &str = "publisher_bridge_enable_ok";
pub const PUBLISHER_BRIDGE_ENABLE_FAILED: &str = "publisher_bridge_enable_failed";
pub const PUBLISHER_BRIDGE_DISABLE: &str = "publisher_bridge_disable";
pub const PUBLISHER_BRIDGE_INGRESS: &str = "publisher_bridge_ingress";
pub const PUBLISHER_CLOSE: &str = "publisher_close";

// Receiver events.
pub const RECEIVER_POLL_FAILED: &str = "receiver_poll_failed";
pub const RECEIVER_ACK_FAILED: &str = "receiver_ack_failed";
pub const RECEIVER_STREAMING_ENABLE: &str = "receiver_streaming_enable";
pub const RECEIVER_STREAMING_ENABLE_FAILED: &str = "receiver_streaming_enable_failed";
pub const RECEIVER_STREAMING_DISABLE: &str = "receiver_streaming_disable";
pub const RECEIVER_BRIDGE_ENABLE_OK: &str = "receiver_bridge_enable_ok";
pub const RECEIVER_BRIDGE_ENABLE_FAILED: &str = "receiver_bridge_enable_failed";
pub const RECEIVER_BRIDGE_RELAY_FAILED: &str = "receiver_bridge_relay_failed";
pub const RECEIVER_UPDATE: &str = "receiver_update";
pub const RECEIVER_CLOSE: &str = "receiver_close";

// Control-plane reconciliation events.
pub const ROUTE_TABLE_READ: &str = "route_table_read";
pub const ROUTE_TABLE_FETCH_FAILED: &str = "route_table_fetch_failed";
pub const RECONCILE_START: &str = "reconcile_start";
pub const RECONCILE_OK: &str = "reconcile_ok";
pub const PUBLISHER_CREATE_FAILED: &str = "publisher_create_failed";
pub const RECEIVER_CREATE_FAILED: &str = "receiver_create_failed";

// Health-check and runtime events.
pub const HEALTH_TRANSPORT_DOWN: &str = "health_transport_down";
pub const HEALTH_RESTART_OK: &str = "health_restart_ok";
pub const HEALTH_RESTART_FAILED: &str = "health_restart_failed";
pub const HEALTH_PUBLISHER_REPAIR: &str = "health_publisher_repair";
pub const HEALTH_RECEIVER_REPAIR: &str = "health_receiver_repair";
pub const HEALTH_BRIDGE_REENABLE: &str = "health_bridge_reenable";
pub const HEALTH_GAP_FILL: &str = "health_gap_fill";
pub const SPEED_SAMPLE: &str = "speed_sample";
pub const RUNTIME_LOOP_START: &str = "runtime_loop_start";
pub const RUNTIME_LOOP_STOP: &str = "runtime_loop_stop";

// Engine lifecycle events.
pub const MESSAGE_BUS_START: &str = "message_bus_start";
pub const MESSAGE_BUS_START_FAILED: &str = "message_bus_start_failed";
pub const MESSAGE_BUS_STOP: &str = "message_bus_stop";
pub const MESSAGE_BUS_CONFIG_UPDATED: &str = "message_bus_config_updated";
