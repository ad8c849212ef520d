//! Core of a cycle-accurate monochrome handheld emulator: CPU, memory bus,
//! cartridge/bank controller, timers, joypad, and PPU, wired into a single
//! `Core` that advances everything one machine cycle at a time.
//!
//! Presentation (windowing, input capture, frame pacing) lives in the
//! `pocketcore_app` binary, not here; this crate only needs a cartridge
//! image in and per-tick key events in, frame buffers out.

pub mod cartridge;
pub mod cpu;
pub mod error;
pub mod joypad;
pub mod memory_bus;
pub mod memory_map;
pub mod ppu;
pub mod timer;

use cpu::Cpu;
use error::BootError;
use joypad::Key;
use memory_bus::MemoryBus;
use ppu::Ppu;

/// Owns every subsystem and drives them through the documented per-cycle
/// component order: CPU, timers, PPU, joypad poll, interrupt dispatch.
pub struct Core {
    pub cpu: Cpu,
    pub bus: MemoryBus,
    pub ppu: Ppu,
}

impl Core {
    pub fn new(rom_data: &[u8]) -> Result<Self, BootError> {
        let bus = MemoryBus::load(rom_data)?;
        Ok(Core {
            cpu: Cpu::new(),
            bus,
            ppu: Ppu::new(),
        })
    }

    /// Advances every subsystem by one machine cycle.
    pub fn tick(&mut self) {
        self.cpu.tick(&mut self.bus);
        self.bus.tick_timer();
        self.ppu.step(4, &mut self.bus);
        self.bus.poll_joypad();
        self.cpu.check_interrupts(&mut self.bus);
    }

    /// Advances the core by `cycles` machine cycles.
    pub fn run_cycles(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.tick();
        }
    }

    /// Ticks until the CPU returns to FETCH state with an empty pipeline,
    /// i.e. until exactly one more instruction has fully retired.
    pub fn step_instruction(&mut self) {
        self.tick();
        while self.cpu.pipeline_len() > 0 {
            self.tick();
        }
    }

    pub fn key_down(&mut self, key: Key) {
        self.bus.key_down(key);
        self.cpu.wake_from_stop();
    }

    pub fn key_up(&mut self, key: Key) {
        self.bus.key_up(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        const LOGO: [u8; 48] = [
            0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0C,
            0x00, 0x0D, 0x00, 0x08, 0x11, 0x1F, 0x88, 0x89, 0x00, 0x0E, 0xDC, 0xCC, 0x6E, 0xE6,
            0xDD, 0xDD, 0xD9, 0x99, 0xBB, 0xBB, 0x67, 0x63, 0x6E, 0x0E, 0xEC, 0xCC, 0xDD, 0xDC,
            0x99, 0x9F, 0xBB, 0xB9, 0x33, 0x3E,
        ];
        rom[0x0104..0x0104 + LOGO.len()].copy_from_slice(&LOGO);
        // LD A, 0x42 ; NOP at the entry point.
        rom[0x0100] = 0x3E;
        rom[0x0101] = 0x42;
        rom[0x0102] = 0x00;
        rom
    }

    #[test]
    fn boot_rejects_truncated_cartridge() {
        assert!(Core::new(&[0u8; 16]).is_err());
    }

    #[test]
    fn core_ticks_cpu_and_clears_draw_frame_over_one_frame() {
        let mut core = Core::new(&minimal_rom()).unwrap();
        core.run_cycles(3);
        assert_eq!(core.cpu.registers().0, 0x42);
    }

    #[test]
    fn one_frame_latches_draw_frame_and_vblank_interrupt_exactly_once() {
        use memory_map::{IF_ADDR, LCDC_ADDR, SCX_ADDR, SCY_ADDR, VBLANK_INTERRUPT_BIT};

        let mut core = Core::new(&minimal_rom()).unwrap();
        core.bus.write_byte(LCDC_ADDR, 0x80);
        core.bus.write_byte(SCX_ADDR, 0x00);
        core.bus.write_byte(SCY_ADDR, 0x00);
        for addr in 0x9800u16..=0x9BFF {
            core.bus.write_byte(addr, 0x01);
        }
        core.bus.write_byte(IF_ADDR, 0x00);

        // One frame is 70,224 dots; `Core::tick` advances the PPU by 4 dots
        // per machine cycle, so one frame is 70,224 / 4 = 17,556 ticks.
        let mut frames_drawn = 0;
        for _ in 0..17_556 {
            core.tick();
            if core.ppu.take_draw_frame() {
                frames_drawn += 1;
            }
        }

        assert_eq!(frames_drawn, 1);
        assert_eq!(core.bus.read_byte(IF_ADDR) & (1 << VBLANK_INTERRUPT_BIT), 1 << VBLANK_INTERRUPT_BIT);
    }
}
