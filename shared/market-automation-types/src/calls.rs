use alloy_primitives::{Address, Bytes};

/// A single ledger call: `payload` is executed against `target` inside a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtomicCall {
    pub target: Address,
    pub payload: Bytes,
}

impl AtomicCall {
    pub fn new(target: Address, payload: impl Into<Bytes>) -> Self {
        Self {
            target,
            payload: payload.into(),
        }
    }

    /// Leading 4-byte function selector, if the payload carries one.
    pub fn selector(&self) -> Option<[u8; 4]> {
        let head = self.payload.get(..4)?;
        let mut sel = [0u8; 4];
        sel.copy_from_slice(head);
        Some(sel)
    }
}

/// Ordered sequence of calls submitted as one all-or-nothing meta-transaction.
///
/// Order is significant: a step that depends on an earlier step's side effect (an approval
/// before the transfer that spends it) must be pushed after it. Calls are never reordered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    calls: Vec<AtomicCall>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, call: AtomicCall) {
        self.calls.push(call);
    }

    pub fn extend(&mut self, calls: impl IntoIterator<Item = AtomicCall>) {
        self.calls.extend(calls);
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn calls(&self) -> &[AtomicCall] {
        &self.calls
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtomicCall> {
        self.calls.iter()
    }

    pub fn into_calls(self) -> Vec<AtomicCall> {
        self.calls
    }

    /// Position of the first call whose selector matches `selector`.
    pub fn position_of(&self, selector: [u8; 4]) -> Option<usize> {
        self.calls.iter().position(|c| c.selector() == Some(selector))
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a AtomicCall;
    type IntoIter = std::slice::Iter<'a, AtomicCall>;

    fn into_iter(self) -> Self::IntoIter {
        self.calls.iter()
    }
}

impl From<Vec<AtomicCall>> for Batch {
    fn from(calls: Vec<AtomicCall>) -> Self {
        Self { calls }
    }
}
