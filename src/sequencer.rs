//! Detects whether the card in the field is a backdoored clone.
//!
//! HALT, then the 7 bit unlock wake-up, then the one byte backdoor command.
//! A genuine card stays silent on one of the two unlock stages.

use crate::crc;
use crate::picc::{self, Atqa};
use crate::transport::{FrameTransport, Transceiver};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum State {
    Start,
    Woken,
    Probed,
    BackdoorTest,
    BackdoorConfirmed,
    NotBackdoored,
}

/// What came back from the frame sent in a state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    Answered,
    Silent,
}

impl State {
    /// Next state once the action of `self` produced `reply`. States whose
    /// action sends nothing, or whose answer does not matter, ignore it.
    pub fn transition(self, reply: Reply) -> State {
        match (self, reply) {
            // HALT is a best-effort reset, its answer is never looked at.
            (State::Start, _) => State::Woken,
            (State::Woken, Reply::Answered) => State::Probed,
            (State::Woken, Reply::Silent) => State::NotBackdoored,
            (State::Probed, _) => State::BackdoorTest,
            (State::BackdoorTest, Reply::Answered) => State::BackdoorConfirmed,
            (State::BackdoorTest, Reply::Silent) => State::NotBackdoored,
            (terminal, _) => terminal,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, State::BackdoorConfirmed | State::NotBackdoored)
    }
}

/// Proof that the card ACKed the backdoor command. Only the sequencer
/// creates one, and block writes require it.
#[derive(Debug, PartialEq)]
pub struct Unlocked {
    atqa: Atqa,
}

impl Unlocked {
    /// ATQA as recorded from the unlock wake-up response.
    pub fn atqa(&self) -> Atqa {
        self.atqa
    }
}

#[derive(Debug, PartialEq)]
pub enum Detection {
    BackdoorConfirmed(Unlocked),
    NotBackdoored,
}

pub struct Sequencer {
    state: State,
    atqa: Atqa,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            state: State::Start,
            atqa: [0; 2],
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Performs the action of the current state and moves on by one state.
    pub fn step<T: Transceiver>(&mut self, transport: &mut FrameTransport<T>) -> State {
        let reply = match self.state {
            State::Start => {
                let halt = crc::append_checksum(&picc::HALT_PAYLOAD);
                if let Err(e) = transport.send_bytes(&halt) {
                    log::debug!("HALT not acknowledged: {}", e);
                }
                Reply::Silent
            }
            State::Woken => match transport
                .send_bits(&picc::UNLOCK_WAKEUP_FRAME, picc::UNLOCK_WAKEUP_BITS)
            {
                Ok(response) => {
                    // Whatever the buffer holds is kept, the card's answer is
                    // usually only a 4-bit ACK.
                    let data = response.data();
                    let len = data.len().min(self.atqa.len());
                    self.atqa = [0; 2];
                    self.atqa[..len].copy_from_slice(&data[..len]);
                    Reply::Answered
                }
                Err(e) => {
                    log::debug!("no answer to unlock wake-up: {}", e);
                    Reply::Silent
                }
            },
            State::Probed => {
                log::debug!("ATQA {:02x} {:02x}", self.atqa[0], self.atqa[1]);
                Reply::Answered
            }
            State::BackdoorTest => match transport.send_bytes(&picc::UNLOCK_BACKDOOR_FRAME) {
                Ok(_) => Reply::Answered,
                Err(e) => {
                    log::debug!("backdoor command rejected: {}", e);
                    Reply::Silent
                }
            },
            terminal => return terminal,
        };
        let next = self.state.transition(reply);
        log::debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
        next
    }

    /// Runs the sequence to a terminal state.
    pub fn run<T: Transceiver>(mut self, transport: &mut FrameTransport<T>) -> Detection {
        while !self.step(transport).is_terminal() {}
        match self.state {
            State::BackdoorConfirmed => {
                log::info!("This is a backdoored rewritable UID card");
                Detection::BackdoorConfirmed(Unlocked { atqa: self.atqa })
            }
            _ => {
                log::info!("This is NOT a backdoored rewritable UID card");
                Detection::NotBackdoored
            }
        }
    }
}

/// Runs a fresh [`Sequencer`] against the card in the field.
pub fn detect<T: Transceiver>(transport: &mut FrameTransport<T>) -> Detection {
    Sequencer::new().run(transport)
}

#[cfg(test)]
pub(crate) fn unlocked_for_tests() -> Unlocked {
    Unlocked { atqa: [0x04, 0x00] }
}
