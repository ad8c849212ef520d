use pocketcore::cpu::Cpu;
use pocketcore::joypad::Key;
use pocketcore::memory_bus::MemoryBus;
use pocketcore::ppu::Ppu;
use std::fs;
use std::path::Path;
use super::constants;

/// Presenter-side wrapper around the core's CPU/bus/PPU trio. Kept as flat
/// fields (rather than a single `pocketcore::Core`) so the drawing and input
/// modules can borrow `cpu`/`ppu`/`memory_bus` independently of each other.
pub struct Emulator {
    pub cpu: Cpu,
    pub ppu: Ppu,
    pub memory_bus: MemoryBus,
    pub stepping: bool,
}

impl Emulator {
    /// Creates a new Emulator instance, loads the ROM, and initializes components.
    pub fn new(rom_path: &Path) -> Result<Self, String> {
        log::info!("loading ROM: {}", rom_path.display());
        let rom_data = fs::read(rom_path)
            .map_err(|e| format!("failed to read ROM '{}': {}", rom_path.display(), e))?;
        let rom_size = rom_data.len();

        let memory_bus = MemoryBus::load(&rom_data)
            .map_err(|e| format!("failed to boot ROM '{}': {}", rom_path.display(), e))?;
        log::info!("ROM loaded successfully ({} bytes): {}", rom_size, memory_bus.title());

        let cpu = Cpu::new();
        let ppu = Ppu::new();

        Ok(Emulator {
            cpu,
            ppu,
            memory_bus,
            stepping: false,
        })
    }

    /// Advances every subsystem by one machine cycle, in the fixed order:
    /// CPU, timer, PPU (4 dots), joypad poll, interrupt dispatch.
    fn tick(&mut self) {
        self.cpu.tick(&mut self.memory_bus);
        self.memory_bus.tick_timer();
        self.ppu.step(4, &mut self.memory_bus);
        self.memory_bus.poll_joypad();
        self.cpu.check_interrupts(&mut self.memory_bus);
    }

    /// Runs the emulator components for approximately one frame's worth of CPU cycles.
    pub fn run_frame(&mut self) {
        for _ in 0..constants::CYCLES_PER_FRAME {
            self.tick();
        }
    }

    pub fn toggle_stepping(&mut self) {
        self.stepping = !self.stepping;
    }

    /// Ticks until the current instruction has fully retired.
    pub fn step_instruction(&mut self) {
        self.tick();
        while self.cpu.pipeline_len() > 0 {
            self.tick();
        }
    }

    pub fn key_down(&mut self, key: Key) {
        self.memory_bus.key_down(key);
        self.cpu.wake_from_stop();
    }

    pub fn key_up(&mut self, key: Key) {
        self.memory_bus.key_up(key);
    }
}
