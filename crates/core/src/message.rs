//! Addressed outbound messages.

use anchorlog_types::NodeId;

/// A single payload addressed to one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutMessage<M> {
    /// Recipient; may be the sending node itself.
    pub recipient: NodeId,
    pub payload: M,
}

/// Multiset of outbound messages returned by a protocol transition.
///
/// The runner handles the actual network I/O. Order is the order in which
/// messages were added, which keeps simulation runs reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutMessages<M> {
    messages: Vec<OutMessage<M>>,
}

impl<M> Default for OutMessages<M> {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
        }
    }
}

impl<M> OutMessages<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address `payload` to `recipient`.
    pub fn add(&mut self, recipient: NodeId, payload: M) -> &mut Self {
        self.messages.push(OutMessage { recipient, payload });
        self
    }

    /// Send a copy of `payload` to every recipient.
    pub fn broadcast<I>(&mut self, recipients: I, payload: M) -> &mut Self
    where
        I: IntoIterator<Item = NodeId>,
        M: Clone,
    {
        for recipient in recipients {
            self.add(recipient, payload.clone());
        }
        self
    }

    pub fn extend(&mut self, other: OutMessages<M>) -> &mut Self {
        self.messages.extend(other.messages);
        self
    }

    /// Transform every payload, keeping the recipients.
    pub fn map<N, F>(self, mut f: F) -> OutMessages<N>
    where
        F: FnMut(M) -> N,
    {
        OutMessages {
            messages: self
                .messages
                .into_iter()
                .map(|m| OutMessage {
                    recipient: m.recipient,
                    payload: f(m.payload),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OutMessage<M>> {
        self.messages.iter()
    }

    /// Messages addressed to `recipient`.
    pub fn for_recipient(&self, recipient: NodeId) -> impl Iterator<Item = &M> + '_ {
        self.messages
            .iter()
            .filter(move |m| m.recipient == recipient)
            .map(|m| &m.payload)
    }
}

impl<M> IntoIterator for OutMessages<M> {
    type Item = OutMessage<M>;
    type IntoIter = std::vec::IntoIter<OutMessage<M>>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl<'a, M> IntoIterator for &'a OutMessages<M> {
    type Item = &'a OutMessage<M>;
    type IntoIter = std::slice::Iter<'a, OutMessage<M>>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
