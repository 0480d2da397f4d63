// relaylink-api: line-oriented command/response protocol for serial-attached
// WiFi radio modules (transport, framing, response grammars, exchanges)

pub mod command;
pub mod error;
pub mod exchange;
pub mod line;
pub mod parse;
pub mod transport;
pub mod types;

pub use command::{Command, Verb};
pub use error::{Error, TransportError};
pub use exchange::{EndCondition, ExchangeOutcome, ExchangeReport, ExchangeResult, ExchangeSpec, exchange, send_command};
pub use line::LineAssembler;
pub use parse::{
    Classified, Completion, CsvGrammar, HostEntry, NetworkRecord, ObservedNetwork, ProbeEntry, SnifferHeader, classify,
};
pub use transport::{
    Connector, MemoryPeer, MemoryTransport, Parity, SerialConnector, SerialPortInfo, SerialSettings, SerialTransport,
    Transport, available_ports,
};
pub use types::{Band, MacAddress};
