/// The ranges message numbers are allocated in.
///
/// See [RFC 4251 section 7](https://tools.ietf.org/html/rfc4251#section-7).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MessageType {
    /// Message number `0`, which is never assigned.
    Zero,
    /// Transport layer generic messages such as "disconnect", "ignore" and "debug".
    TransportLayerGeneric,
    /// Messages of the algorithm negotiation.
    AlgorithmNegotiation,
    /// Messages whose meaning depends on the negotiated key exchange method.
    KeyExchangeMethodSpecific,
    /// Messages of the user authentication or the connection protocol.
    ///
    /// The transport layer passes these through to the layer above.
    Service,
    /// Message numbers reserved for client protocols.
    Reserved,
    /// Message numbers for local extensions.
    LocalExtension,
}

impl MessageType {
    /// Returns the message type for the given message number.
    pub fn from_number(message_number: u8) -> MessageType {
        match message_number {
            0 => MessageType::Zero,
            1..=19 => MessageType::TransportLayerGeneric,
            20..=29 => MessageType::AlgorithmNegotiation,
            30..=49 => MessageType::KeyExchangeMethodSpecific,
            50..=127 => MessageType::Service,
            128..=191 => MessageType::Reserved,
            192..=255 => MessageType::LocalExtension,
        }
    }

    /// Returns the message type for a non-empty message.
    pub fn from_message(message: &[u8]) -> Option<MessageType> {
        message.first().copied().map(MessageType::from_number)
    }
}
