//! Error taxonomy for network compilation.
//!
//! Data errors come from reading and validating the JSON description,
//! topology errors from the global passes over the machine graph, compile
//! errors from turning units into scripts. Every variant names the offending
//! machine label and field. Runtime convergence outcomes are never errors;
//! they only exist inside rendered scripts.

use thiserror::Error;

/// Result type for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed or out-of-range input.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse JSON in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("network '{network}': include {path}: {message}")]
    Include {
        network: String,
        path: String,
        message: String,
    },
    #[error("network '{network}' not found in input")]
    NetworkNotFound { network: String },
    #[error("'{label}' is not a valid machine label")]
    InvalidLabel { label: String },
    #[error("machine label '{label}' is declared more than once")]
    DuplicateLabel { label: String },
    #[error("{label}: {field} port {value} is outside 1-65535")]
    InvalidPort {
        label: String,
        field: String,
        value: i64,
    },
    #[error("{label}: {field} '{value}' is not a valid IPv4 address")]
    InvalidIp {
        label: String,
        field: String,
        value: String,
    },
    #[error("{label}: {field} '{value}' is not a valid MAC address")]
    InvalidMac {
        label: String,
        field: String,
        value: String,
    },
    #[error("{label}: {field} '{mac}' is already used by '{other}'")]
    DuplicateMac {
        label: String,
        field: String,
        mac: String,
        other: String,
    },
    #[error("{label}: interface '{iface}' is declared more than once")]
    DuplicateInterface { label: String, iface: String },
    #[error("{label}: interface '{iface}': {reason}")]
    InvalidInterface {
        label: String,
        iface: String,
        reason: String,
    },
    #[error("{label}: {field} references user '{user}' which is not declared")]
    MissingUser {
        label: String,
        field: String,
        user: String,
    },
    #[error("{label}: missing required field {field}")]
    MissingField { label: String, field: String },
    #[error("{label}: {field} '{value}' is invalid, expected {expected}")]
    InvalidValue {
        label: String,
        field: String,
        value: String,
        expected: String,
    },
    #[error("{label}: unknown profile '{profile}'")]
    UnknownProfile { label: String, profile: String },
}

/// Failures of the global passes over a fully built machine graph.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("network '{network}' declares no router")]
    NoRouter { network: String },
    #[error("network '{network}' declares more than one router: {labels}")]
    MultipleRouters { network: String, labels: String },
    #[error("{label}: interface '{iface}' needs a MAC address")]
    MissingMac { label: String, iface: String },
    #[error("{label}: {field} references '{reference}' which is neither a machine label nor a host")]
    UnresolvedLabel {
        label: String,
        field: String,
        reference: String,
    },
    #[error("{label}: hypervisor '{hypervisor}' is not a hypervisor in this network")]
    UnknownHypervisor { label: String, hypervisor: String },
    #[error("{label}: {field} {address} is already taken by {owner}")]
    AddressInUse {
        label: String,
        field: String,
        address: String,
        owner: String,
    },
    #[error("{label}: {field} {address} is outside its subnet {subnet}")]
    AddressOutsideSubnet {
        label: String,
        field: String,
        address: String,
        subnet: String,
    },
    #[error("{label}: no free address left in {subnet}")]
    SubnetExhausted { label: String, subnet: String },
    #[error("no free {prefix_len}-bit subnet left for {machine_type} machines")]
    NoFreeSubnet {
        machine_type: String,
        prefix_len: u8,
    },
}

/// Failures turning a machine's units into scripts.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{machine}: unit label '{label}' is not a shell identifier")]
    InvalidUnitLabel { machine: String, label: String },
    #[error("{machine}: unit label '{label}' is used more than once")]
    DuplicateUnit { machine: String, label: String },
    #[error("{machine}: unit '{label}' depends on '{precondition}' which is not rendered before it")]
    PreconditionNotRendered {
        machine: String,
        label: String,
        precondition: String,
    },
    #[error("{machine}: chain name '{chain}' exceeds {max} characters")]
    ChainNameTooLong {
        machine: String,
        chain: String,
        max: usize,
    },
    #[error("{machine}: failed to render firewall document: {message}")]
    FirewallDocument { machine: String, message: String },
}

/// Any library failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}
