//! VCD file sink.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use vcd_ng::{IdCode, TimescaleUnit, Value, VecValue, Writer};

use crate::common::constants::{TRACE_CYCLE_VAR, TRACE_TOP_SCOPE};
use crate::model::{Probe, SignalInfo};

/// File handle shared between the VCD writer and the sink, so the sink can flush
/// without going through the writer.
#[derive(Debug, Clone)]
struct SharedFile(Rc<RefCell<BufWriter<File>>>);

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.borrow_mut().flush()
    }
}

struct TracedSignal {
    info: SignalInfo,
    id: IdCode,
    last: Option<u64>,
}

/// An open VCD file with its declared variables.
pub struct VcdSink {
    writer: Writer<SharedFile>,
    file: SharedFile,
    cycle: IdCode,
    signals: Vec<TracedSignal>,
    values: Vec<u64>,
}

impl std::fmt::Debug for VcdSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcdSink")
            .field("signals", &self.signals.len())
            .finish_non_exhaustive()
    }
}

impl VcdSink {
    /// Creates `path` and writes the header, declaring the cycle counter and every
    /// signal in `signals` under the top scope.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures from creating or writing the file.
    pub fn create(path: &Path, signals: &[SignalInfo]) -> io::Result<Self> {
        let file = SharedFile(Rc::new(RefCell::new(BufWriter::new(File::create(path)?))));
        let mut writer = Writer::new(file.clone());
        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module(TRACE_TOP_SCOPE)?;
        let cycle = writer.add_wire(64, TRACE_CYCLE_VAR)?;

        // Declared in path order so scopes nest; sampled in probe order.
        let mut order: Vec<usize> = (0..signals.len()).collect();
        order.sort_by(|&a, &b| signals[a].path.cmp(&signals[b].path));

        let mut open: Vec<&str> = Vec::new();
        let mut ids = vec![None; signals.len()];
        for i in order {
            let info = &signals[i];
            let scopes: Vec<&str> = info.scopes().collect();
            let common = open
                .iter()
                .zip(&scopes)
                .take_while(|(a, b)| a == b)
                .count();
            while open.len() > common {
                writer.upscope()?;
                let _ = open.pop();
            }
            for &scope in &scopes[common..] {
                writer.add_module(scope)?;
                open.push(scope);
            }
            ids[i] = Some(writer.add_wire(info.width, info.name())?);
        }
        for _ in 0..open.len() {
            writer.upscope()?;
        }
        writer.upscope()?;
        writer.enddefinitions()?;

        let traced = signals
            .iter()
            .zip(ids)
            .filter_map(|(info, id)| {
                id.map(|id| TracedSignal {
                    info: info.clone(),
                    id,
                    last: None,
                })
            })
            .collect();

        Ok(Self {
            writer,
            file,
            cycle,
            signals: traced,
            values: Vec::new(),
        })
    }

    /// Writes one timestamp and the changes of every signal within `depth`.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures from the underlying file.
    pub fn sample(&mut self, counter: u64, probe: Option<&dyn Probe>, depth: usize) -> io::Result<()> {
        self.writer.timestamp(counter)?;
        self.writer.change_vector(self.cycle, &VecValue::from(bits(counter, 64)))?;

        let Some(probe) = probe else {
            return Ok(());
        };
        probe.sample_into(&mut self.values);
        for (signal, &raw) in self.signals.iter_mut().zip(&self.values) {
            if signal.info.depth() > depth {
                signal.last = None;
                continue;
            }
            let value = signal.info.mask(raw);
            if signal.last == Some(value) {
                continue;
            }
            signal.last = Some(value);
            if signal.info.width == 1 {
                self.writer
                    .change_scalar(signal.id, if value != 0 { Value::V1 } else { Value::V0 })?;
            } else {
                self.writer
                    .change_vector(signal.id, &VecValue::from(bits(value, signal.info.width)))?;
            }
        }
        Ok(())
    }

    /// Number of declared probe signals.
    pub fn declared(&self) -> usize {
        self.signals.len()
    }

    /// Pushes buffered output to the file.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures from the underlying file.
    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn bits(value: u64, width: u32) -> Vec<Value> {
    (0..width)
        .rev()
        .map(|i| if value >> i & 1 == 1 { Value::V1 } else { Value::V0 })
        .collect()
}
