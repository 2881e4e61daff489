//! Simulated PN532 behind `embedded-hal` SPI and NSS handles.
//!
//! The device decodes every complete host frame it receives, queues an ACK
//! and a response frame, and raises the ready flag while a read is pending.
//! Scripts and overrides let tests inject delays, bad ACKs and corrupted
//! frames. Single threaded (`Rc`) like the driver it exercises.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, SpiBus};
use log::trace;

use crate::bus::{commands as bus_commands, Clock, STATUS_READY};
use crate::decoder::{decode, FrameRules};
use crate::encoder::encode;
use crate::frame::{Direction, ACK_FRAME, MAX_PAYLOAD_LEN};
use crate::session::commands;

/// A card in the simulated RF field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimCard {
    pub uid: Vec<u8>,
    pub sens_res: [u8; 2],
    pub sel_res: u8,
}

impl SimCard {
    pub fn ntag(uid: &[u8]) -> Self {
        Self {
            uid: uid.to_vec(),
            sens_res: [0x00, 0x44],
            sel_res: 0x00,
        }
    }

    pub fn mifare_classic_1k(uid: &[u8]) -> Self {
        Self {
            uid: uid.to_vec(),
            sens_res: [0x00, 0x04],
            sel_res: 0x08,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Status,
    Write,
    Read,
    Unknown,
}

struct PendingRead {
    bytes: Vec<u8>,
    not_ready_polls: usize,
}

#[derive(Default)]
struct Device {
    selected: bool,
    op: Option<Op>,
    status_ready: bool,
    write_buf: Vec<u8>,
    read_pos: usize,
    reads: VecDeque<PendingRead>,

    status_script: Option<(Vec<bool>, usize)>,
    status_reads: usize,
    data_reads: usize,
    last_write: Vec<u8>,
    last_command: Option<Vec<u8>>,
    fail_next: bool,

    reverse_bits: bool,
    ack_delay_polls: usize,
    response_delay_polls: usize,
    firmware: [u8; 4],
    card: Option<SimCard>,
    card_script: VecDeque<Option<SimCard>>,
    corrupt_ack: Option<[u8; 6]>,
    drop_ack: bool,
    next_payload: Option<Vec<u8>>,
    next_frame: Option<Vec<u8>>,
}

impl Device {
    fn select(&mut self) {
        self.selected = true;
        self.op = None;
    }

    fn deselect(&mut self) {
        if self.selected {
            match self.op {
                Some(Op::Write) => {
                    self.last_write = core::mem::take(&mut self.write_buf);
                    self.process_write();
                }
                Some(Op::Read) => {
                    self.reads.pop_front();
                }
                _ => {}
            }
        }
        self.selected = false;
        self.op = None;
    }

    fn exchange(&mut self, wire_out: u8) -> u8 {
        if !self.selected {
            return 0xFF;
        }
        let out = self.wire(wire_out);
        let reply = match self.op {
            None => {
                self.begin(out);
                0x00
            }
            Some(Op::Status) => {
                if self.status_ready {
                    STATUS_READY
                } else {
                    0x00
                }
            }
            Some(Op::Write) => {
                self.write_buf.push(out);
                0x00
            }
            Some(Op::Read) => {
                let byte = self
                    .reads
                    .front()
                    .and_then(|r| r.bytes.get(self.read_pos).copied())
                    .unwrap_or(0x00);
                self.read_pos += 1;
                byte
            }
            Some(Op::Unknown) => 0x00,
        };
        self.wire(reply)
    }

    fn wire(&self, byte: u8) -> u8 {
        if self.reverse_bits {
            byte.reverse_bits()
        } else {
            byte
        }
    }

    fn begin(&mut self, marker: u8) {
        self.op = Some(match marker {
            bus_commands::STATUS_READ => {
                self.status_ready = self.poll_status();
                Op::Status
            }
            bus_commands::DATA_WRITE => {
                self.write_buf.clear();
                self.write_buf.push(marker);
                Op::Write
            }
            bus_commands::DATA_READ => {
                self.data_reads += 1;
                self.read_pos = 0;
                Op::Read
            }
            _ => Op::Unknown,
        });
    }

    fn poll_status(&mut self) -> bool {
        self.status_reads += 1;
        if let Some((script, pos)) = &mut self.status_script {
            let ready = script[(*pos).min(script.len() - 1)];
            *pos += 1;
            return ready;
        }
        match self.reads.front_mut() {
            Some(read) if read.not_ready_polls > 0 => {
                read.not_ready_polls -= 1;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn process_write(&mut self) {
        let frame = match self.last_write.split_first() {
            Some((_marker, frame)) => frame.to_vec(),
            None => return,
        };
        let mut command = [0u8; MAX_PAYLOAD_LEN];
        let rules = FrameRules {
            direction: Direction::HostToDevice,
            strict_framing: true,
        };
        let len = match decode(&frame, &mut command, rules) {
            Ok(len) if len > 0 => len,
            other => {
                trace!("sim: ignoring host frame {:02X?}: {:?}", frame, other);
                return;
            }
        };
        let command = command[..len].to_vec();

        let ack = self.corrupt_ack.take().unwrap_or(ACK_FRAME);
        if !core::mem::take(&mut self.drop_ack) {
            self.reads.push_back(PendingRead {
                bytes: ack.to_vec(),
                not_ready_polls: self.ack_delay_polls,
            });
        }

        let frame = match self.next_frame.take() {
            Some(frame) => frame,
            None => {
                let payload = match self.next_payload.take() {
                    Some(payload) => payload,
                    None => self.respond(&command),
                };
                encode(Direction::DeviceToHost, &payload)
                    .map(|f| f.to_vec())
                    .unwrap_or_default()
            }
        };
        self.reads.push_back(PendingRead {
            bytes: frame,
            not_ready_polls: self.response_delay_polls,
        });
        self.last_command = Some(command);
    }

    fn respond(&mut self, command: &[u8]) -> Vec<u8> {
        let code = command[0];
        let mut payload = std::vec![code.wrapping_add(1)];
        match code {
            commands::GET_FIRMWARE_VERSION => payload.extend_from_slice(&self.firmware),
            commands::SAM_CONFIGURATION => {}
            commands::IN_LIST_PASSIVE_TARGET => {
                let card = match self.card_script.pop_front() {
                    Some(card) => card,
                    None => self.card.clone(),
                };
                match card {
                    Some(card) => {
                        payload.extend_from_slice(&[0x01, 0x01]);
                        payload.extend_from_slice(&card.sens_res);
                        payload.push(card.sel_res);
                        payload.push(card.uid.len() as u8);
                        payload.extend_from_slice(&card.uid);
                    }
                    None => payload.push(0x00),
                }
            }
            _ => {}
        }
        payload
    }
}

/// Handle to the simulated device; clones share the same device.
#[derive(Clone)]
pub struct SimulatedPn532 {
    device: Rc<RefCell<Device>>,
}

impl Default for SimulatedPn532 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPn532 {
    /// A PN532 v1.6 with an empty field.
    pub fn new() -> Self {
        let device = Device {
            firmware: [0x32, 0x01, 0x06, 0x07],
            ..Device::default()
        };
        Self {
            device: Rc::new(RefCell::new(device)),
        }
    }

    pub fn with_reversed_bits(self, reverse: bool) -> Self {
        self.device.borrow_mut().reverse_bits = reverse;
        self
    }

    /// Status probes that report not-ready before each ACK.
    pub fn with_ack_delay_polls(self, polls: usize) -> Self {
        self.device.borrow_mut().ack_delay_polls = polls;
        self
    }

    /// Status probes that report not-ready before each response.
    pub fn with_response_delay_polls(self, polls: usize) -> Self {
        self.device.borrow_mut().response_delay_polls = polls;
        self
    }

    pub fn with_firmware(self, firmware: [u8; 4]) -> Self {
        self.device.borrow_mut().firmware = firmware;
        self
    }

    pub fn with_card(self, card: SimCard) -> Self {
        self.set_card(Some(card));
        self
    }

    pub fn spi(&self) -> SimSpi {
        SimSpi {
            device: Rc::clone(&self.device),
        }
    }

    pub fn cs(&self) -> SimCs {
        SimCs {
            device: Rc::clone(&self.device),
        }
    }

    /// Card seen by InListPassiveTarget once the card script is exhausted.
    pub fn set_card(&self, card: Option<SimCard>) {
        self.device.borrow_mut().card = card;
    }

    /// Cards for the next InListPassiveTarget commands, in order.
    pub fn script_cards<I: IntoIterator<Item = Option<SimCard>>>(&self, cards: I) {
        self.device.borrow_mut().card_script.extend(cards);
    }

    /// Answer status probes from `script`; the last entry repeats.
    pub fn set_status_script(&self, script: &[bool]) {
        assert!(!script.is_empty());
        self.device.borrow_mut().status_script = Some((script.to_vec(), 0));
    }

    /// Bytes returned by the next data read transaction.
    pub fn queue_read(&self, bytes: &[u8]) {
        self.device.borrow_mut().reads.push_back(PendingRead {
            bytes: bytes.to_vec(),
            not_ready_polls: 0,
        });
    }

    /// Replace the ACK for the next command.
    pub fn corrupt_next_ack(&self, ack: [u8; 6]) {
        self.device.borrow_mut().corrupt_ack = Some(ack);
    }

    /// Answer the next command without acknowledging it first.
    pub fn drop_next_ack(&self) {
        self.device.borrow_mut().drop_ack = true;
    }

    /// Replace the response data for the next command.
    pub fn set_next_payload(&self, payload: &[u8]) {
        self.device.borrow_mut().next_payload = Some(payload.to_vec());
    }

    /// Replace the whole response frame for the next command.
    pub fn set_next_frame(&self, frame: &[u8]) {
        self.device.borrow_mut().next_frame = Some(frame.to_vec());
    }

    /// Fail the next SPI operation with `ErrorKind::Other`.
    pub fn fail_next_transfer(&self) {
        self.device.borrow_mut().fail_next = true;
    }

    pub fn cs_is_high(&self) -> bool {
        !self.device.borrow().selected
    }

    pub fn status_reads(&self) -> usize {
        self.device.borrow().status_reads
    }

    pub fn data_reads(&self) -> usize {
        self.device.borrow().data_reads
    }

    /// Bytes of the last data write transaction, bus command included.
    pub fn last_write(&self) -> Vec<u8> {
        self.device.borrow().last_write.clone()
    }

    /// Data of the last well-formed command frame.
    pub fn last_command(&self) -> Option<Vec<u8>> {
        self.device.borrow().last_command.clone()
    }
}

/// SPI side of [`SimulatedPn532`].
pub struct SimSpi {
    device: Rc<RefCell<Device>>,
}

impl SimSpi {
    fn check_fault(&mut self) -> Result<(), spi::ErrorKind> {
        let mut device = self.device.borrow_mut();
        if device.fail_next {
            device.fail_next = false;
            return Err(spi::ErrorKind::Other);
        }
        Ok(())
    }
}

impl spi::ErrorType for SimSpi {
    type Error = spi::ErrorKind;
}

impl SpiBus for SimSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.check_fault()?;
        let mut device = self.device.borrow_mut();
        for word in words.iter_mut() {
            *word = device.exchange(0x00);
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.check_fault()?;
        let mut device = self.device.borrow_mut();
        for &word in words {
            device.exchange(word);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.check_fault()?;
        let mut device = self.device.borrow_mut();
        for i in 0..read.len().max(write.len()) {
            let byte = device.exchange(write.get(i).copied().unwrap_or(0x00));
            if let Some(slot) = read.get_mut(i) {
                *slot = byte;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.check_fault()?;
        let mut device = self.device.borrow_mut();
        for word in words.iter_mut() {
            *word = device.exchange(*word);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// NSS side of [`SimulatedPn532`].
pub struct SimCs {
    device: Rc<RefCell<Device>>,
}

impl digital::ErrorType for SimCs {
    type Error = digital::ErrorKind;
}

impl OutputPin for SimCs {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.device.borrow_mut().select();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.device.borrow_mut().deselect();
        Ok(())
    }
}

/// Clock advanced only by [`SimDelay`].
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    elapsed_ns: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.elapsed_ns.set(self.elapsed_ns.get() + ms * 1_000_000);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.elapsed_ns.get() / 1_000_000
    }
}

/// Delay that advances a [`ManualClock`] instead of sleeping.
#[derive(Debug, Clone)]
pub struct SimDelay {
    clock: ManualClock,
}

impl SimDelay {
    pub fn new(clock: &ManualClock) -> Self {
        Self {
            clock: clock.clone(),
        }
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        let elapsed = &self.clock.elapsed_ns;
        elapsed.set(elapsed.get() + u64::from(ns));
    }
}
