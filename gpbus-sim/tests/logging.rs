use std::sync::Mutex;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use gpbus::channel::Channel;
use gpbus::config::CLOCK_CYCLE;
use gpbus::master::{Master, TransferError};
use gpbus::slave::MemorySlave;
use gpbus::{MasterConfig, SlaveConfig};
use gpbus_sim::kernel::Kernel;
use log::{LevelFilter, Log, Metadata, Record};

static MESSAGES: Mutex<Vec<String>> = Mutex::new(Vec::new());

struct Capture;

impl Log for Capture {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        MESSAGES.lock().unwrap().push(record.args().to_string());
    }

    fn flush(&self) {}
}

static LOGGER: Capture = Capture;

// Single test: the logger is global to this binary
#[test]
fn test_failed_write_logs_payload() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let mut channel = Channel::<CriticalSectionRawMutex, 4>::new();
    let (initiator, peq, target) = channel.split();
    let mut memory = vec![0u8; 16];
    let mut slave = MemorySlave::new(target, &mut memory, SlaveConfig::default());
    let mut master = Master::new(initiator, peq, MasterConfig::default()).unwrap();

    // The burst ends past the slave memory
    let transfer = async {
        match select(master.perform_write(0x10, &[0xa5; 20], 20), slave.run()).await {
            Either::First(result) => result,
            Either::Second(_) => unreachable!(),
        }
    };
    let (result, _) = Kernel::new(CLOCK_CYCLE).run(transfer, 1000).unwrap();
    assert_eq!(result, Err(TransferError::RequestError));

    let messages = MESSAGES.lock().unwrap();
    let sent = messages
        .iter()
        .find(|message| message.starts_with("write 0x10: data to send"))
        .expect("payload not logged");
    assert!(sent.contains("0xa5"));
    assert!(messages.iter().any(|message| message.contains("request error")));
}
