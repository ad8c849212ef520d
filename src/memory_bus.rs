use crate::cartridge::Cartridge;
use crate::error::BootError;
use crate::joypad::{Joypad, Key};
use crate::memory_map::*;
use crate::timer::Timer;
use std::fmt;

/// Represents the memory map: cartridge, VRAM, work RAM, OAM, I/O registers,
/// high RAM, and the interrupt-enable byte, plus the joypad and timer state
/// that live behind a handful of those I/O addresses.
pub struct MemoryBus {
    cartridge: Cartridge,
    vram: Box<[u8; VRAM_SIZE]>,
    wram_bank_0: Box<[u8; WRAM_BANK_0_SIZE]>,
    wram_bank_n: Box<[u8; WRAM_BANK_N_SIZE]>,
    oam: Box<[u8; OAM_SIZE]>,
    io_registers: Box<[u8; IO_REGISTERS_SIZE]>,
    hram: Box<[u8; HRAM_SIZE]>,
    interrupt_enable: u8, // FFFF (IE register)

    pub joypad: Joypad,
    timer: Timer,
}

impl MemoryBus {
    /// Builds the bus around an already-validated cartridge, with every I/O
    /// register at its documented post-boot value.
    pub fn new(cartridge: Cartridge) -> Self {
        let mut io_regs = [0u8; IO_REGISTERS_SIZE];
        io_regs[(SB_ADDR - IO_REGISTERS_START) as usize] = 0x00;
        io_regs[(SC_ADDR - IO_REGISTERS_START) as usize] = 0x7E;
        io_regs[(IF_ADDR - IO_REGISTERS_START) as usize] = 0xE1;
        io_regs[(NR10_ADDR - IO_REGISTERS_START) as usize] = 0x80;
        io_regs[(NR11_ADDR - IO_REGISTERS_START) as usize] = 0xBF;
        io_regs[(NR12_ADDR - IO_REGISTERS_START) as usize] = 0xF3;
        io_regs[(NR14_ADDR - IO_REGISTERS_START) as usize] = 0xBF;
        io_regs[(NR21_ADDR - IO_REGISTERS_START) as usize] = 0x3F;
        io_regs[(NR22_ADDR - IO_REGISTERS_START) as usize] = 0x00;
        io_regs[(NR24_ADDR - IO_REGISTERS_START) as usize] = 0xBF;
        io_regs[(NR30_ADDR - IO_REGISTERS_START) as usize] = 0x7F;
        io_regs[(NR31_ADDR - IO_REGISTERS_START) as usize] = 0xFF;
        io_regs[(NR32_ADDR - IO_REGISTERS_START) as usize] = 0x9F;
        io_regs[(NR34_ADDR - IO_REGISTERS_START) as usize] = 0xBF;
        io_regs[(NR41_ADDR - IO_REGISTERS_START) as usize] = 0xFF;
        io_regs[(NR42_ADDR - IO_REGISTERS_START) as usize] = 0x00;
        io_regs[(NR43_ADDR - IO_REGISTERS_START) as usize] = 0x00;
        io_regs[(NR44_ADDR - IO_REGISTERS_START) as usize] = 0xBF;
        io_regs[(NR50_ADDR - IO_REGISTERS_START) as usize] = 0x77;
        io_regs[(NR51_ADDR - IO_REGISTERS_START) as usize] = 0xF3;
        io_regs[(NR52_ADDR - IO_REGISTERS_START) as usize] = 0xF1;
        io_regs[(LCDC_ADDR - IO_REGISTERS_START) as usize] = 0x91;
        io_regs[(STAT_ADDR - IO_REGISTERS_START) as usize] = 0x85;
        io_regs[(SCY_ADDR - IO_REGISTERS_START) as usize] = 0x00;
        io_regs[(SCX_ADDR - IO_REGISTERS_START) as usize] = 0x00;
        io_regs[(LY_ADDR - IO_REGISTERS_START) as usize] = 0x00;
        io_regs[(LYC_ADDR - IO_REGISTERS_START) as usize] = 0x00;
        io_regs[(DMA_ADDR - IO_REGISTERS_START) as usize] = 0xFF;
        io_regs[(BGP_ADDR - IO_REGISTERS_START) as usize] = 0xFC;
        io_regs[(OBP0_ADDR - IO_REGISTERS_START) as usize] = 0xFF;
        io_regs[(OBP1_ADDR - IO_REGISTERS_START) as usize] = 0xFF;
        io_regs[(WY_ADDR - IO_REGISTERS_START) as usize] = 0x00;
        io_regs[(WX_ADDR - IO_REGISTERS_START) as usize] = 0x00;

        MemoryBus {
            cartridge,
            vram: Box::new([0; VRAM_SIZE]),
            wram_bank_0: Box::new([0; WRAM_BANK_0_SIZE]),
            wram_bank_n: Box::new([0; WRAM_BANK_N_SIZE]),
            oam: Box::new([0; OAM_SIZE]),
            io_registers: Box::new(io_regs),
            hram: Box::new([0; HRAM_SIZE]),
            interrupt_enable: 0x00,
            joypad: Joypad::new(),
            timer: Timer::new(),
        }
    }

    /// Validates and loads a cartridge image, then builds the bus around it.
    pub fn load(rom_data: &[u8]) -> Result<Self, BootError> {
        let cartridge = Cartridge::load(rom_data)?;
        Ok(Self::new(cartridge))
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(rom: Vec<u8>) -> Self {
        let cartridge = Cartridge::load(&rom).expect("test ROM image must parse");
        Self::new(cartridge)
    }

    pub fn title(&self) -> &str {
        &self.cartridge.title
    }

    /// Sets the corresponding interrupt flag bit (0-4) in the IF register.
    pub fn request_interrupt(&mut self, bit: u8) {
        if bit < 5 {
            let offset = (IF_ADDR - IO_REGISTERS_START) as usize;
            self.io_registers[offset] |= 1 << bit;
        }
    }

    /// Advances the timer by one machine cycle, raising the timer interrupt
    /// on TIMA overflow.
    pub fn tick_timer(&mut self) {
        if self.timer.tick() {
            self.request_interrupt(TIMER_INTERRUPT_BIT);
        }
    }

    /// Polled once per machine cycle after the PPU tick; raises the joypad
    /// interrupt on a selected-group press edge.
    pub fn poll_joypad(&mut self) {
        if self.joypad.poll_interrupt() {
            self.request_interrupt(JOYPAD_INTERRUPT_BIT);
        }
    }

    pub fn key_down(&mut self, key: Key) {
        self.joypad.key_down(key);
    }

    pub fn key_up(&mut self, key: Key) {
        self.joypad.key_up(key);
    }

    // --- Read/Write ---

    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            ROM_BANK_0_START..=ROM_BANK_0_END => self.cartridge.read_rom_low(addr),
            ROM_BANK_N_START..=ROM_BANK_N_END => self.cartridge.read_rom_bank(addr),
            VRAM_START..=VRAM_END => self.vram[(addr - VRAM_START) as usize],
            EXT_RAM_START..=EXT_RAM_END => self.cartridge.read_ram(addr),
            WRAM_BANK_0_START..=WRAM_BANK_0_END => {
                self.wram_bank_0[(addr - WRAM_BANK_0_START) as usize]
            }
            WRAM_BANK_N_START..=WRAM_BANK_N_END => {
                self.wram_bank_n[(addr - WRAM_BANK_N_START) as usize]
            }
            ECHO_RAM_START..=ECHO_RAM_END => self.read_byte(addr - 0x2000),
            OAM_START..=OAM_END => self.oam[(addr - OAM_START) as usize],
            NOT_USABLE_START..=NOT_USABLE_END => 0xFF,
            IO_REGISTERS_START..=IO_REGISTERS_END => {
                let offset = (addr - IO_REGISTERS_START) as usize;
                match addr {
                    P1_JOYP_ADDR => self.joypad.read_p1(),
                    DIV_ADDR => self.timer.read_div(),
                    TIMA_ADDR => self.timer.read_tima(),
                    TMA_ADDR => self.timer.read_tma(),
                    TAC_ADDR => self.timer.read_tac(),
                    STAT_ADDR => self.io_registers[offset] | 0x80,
                    _ => self.io_registers[offset],
                }
            }
            HRAM_START..=HRAM_END => self.hram[(addr - HRAM_START) as usize],
            INTERRUPT_ENABLE_REGISTER => self.interrupt_enable,
        }
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) {
        match addr {
            ROM_BANK_0_START..=ROM_BANK_N_END => self.cartridge.write_control(addr, value),
            VRAM_START..=VRAM_END => self.vram[(addr - VRAM_START) as usize] = value,
            EXT_RAM_START..=EXT_RAM_END => self.cartridge.write_ram(addr, value),
            WRAM_BANK_0_START..=WRAM_BANK_0_END => {
                self.wram_bank_0[(addr - WRAM_BANK_0_START) as usize] = value;
            }
            WRAM_BANK_N_START..=WRAM_BANK_N_END => {
                self.wram_bank_n[(addr - WRAM_BANK_N_START) as usize] = value;
            }
            ECHO_RAM_START..=ECHO_RAM_END => self.write_byte(addr - 0x2000, value),
            OAM_START..=OAM_END => self.oam[(addr - OAM_START) as usize] = value,
            NOT_USABLE_START..=NOT_USABLE_END => {}
            IO_REGISTERS_START..=IO_REGISTERS_END => {
                let offset = (addr - IO_REGISTERS_START) as usize;
                match addr {
                    P1_JOYP_ADDR => self.joypad.write_select(value),
                    DIV_ADDR => self.timer.write_div(),
                    TIMA_ADDR => self.timer.write_tima(value),
                    TMA_ADDR => self.timer.write_tma(value),
                    TAC_ADDR => self.timer.write_tac(value),
                    IF_ADDR => {
                        self.io_registers[offset] = (value & 0x1F) | (self.io_registers[offset] & 0xE0);
                    }
                    LY_ADDR => self.io_registers[offset] = 0,
                    DMA_ADDR => {
                        self.io_registers[offset] = value;
                        self.perform_dma_transfer(value);
                    }
                    SB_ADDR => {
                        log::debug!("serial byte written: {:#04X} (stub sink)", value);
                        self.io_registers[offset] = value;
                    }
                    STAT_ADDR => {
                        // Only bits 3-6 (interrupt enables) are writable from the CPU;
                        // mode and coincidence bits stay PPU-owned.
                        self.io_registers[offset] =
                            (value & 0b0111_1000) | (self.io_registers[offset] & 0b1000_0111);
                    }
                    _ => self.io_registers[offset] = value,
                }
            }
            HRAM_START..=HRAM_END => self.hram[(addr - HRAM_START) as usize] = value,
            INTERRUPT_ENABLE_REGISTER => self.interrupt_enable = value & 0x1F,
        }
    }

    pub fn read_word(&self, addr: u16) -> u16 {
        let low = self.read_byte(addr) as u16;
        let high = self.read_byte(addr.wrapping_add(1)) as u16;
        (high << 8) | low
    }

    pub fn write_word(&mut self, addr: u16, value: u16) {
        self.write_byte(addr, (value & 0xFF) as u8);
        self.write_byte(addr.wrapping_add(1), (value >> 8) as u8);
    }

    /// Performs an OAM DMA transfer. Modeled as bus-atomic: the 160-byte
    /// copy completes before the cycle after the triggering write.
    fn perform_dma_transfer(&mut self, source_high_byte: u8) {
        let source_start_addr = (source_high_byte as u16) << 8;
        for i in 0..OAM_SIZE {
            self.oam[i] = self.read_byte(source_start_addr.wrapping_add(i as u16));
        }
    }

    // --- Accessors used by components that need to bypass the normal
    //     CPU-facing write semantics (PPU register bookkeeping). ---

    pub fn get_io_reg(&self, addr: u16) -> u8 {
        if (IO_REGISTERS_START..=IO_REGISTERS_END).contains(&addr) {
            self.io_registers[(addr - IO_REGISTERS_START) as usize]
        } else if addr == INTERRUPT_ENABLE_REGISTER {
            self.interrupt_enable
        } else {
            0xFF
        }
    }

    pub fn set_io_reg_direct(&mut self, addr: u16, value: u8) {
        if (IO_REGISTERS_START..=IO_REGISTERS_END).contains(&addr) {
            self.io_registers[(addr - IO_REGISTERS_START) as usize] = value;
        } else if addr == INTERRUPT_ENABLE_REGISTER {
            self.interrupt_enable = value & 0x1F;
        }
    }

    pub fn get_vram(&self) -> &[u8; VRAM_SIZE] {
        &self.vram
    }

    pub fn get_oam(&self) -> &[u8; OAM_SIZE] {
        &self.oam
    }
}

impl fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBus")
            .field("title", &self.cartridge.title)
            .field("IE", &format_args!("{:#04X}", self.interrupt_enable))
            .field("IF", &format_args!("{:#04X}", self.get_io_reg(IF_ADDR)))
            .field("joypad", &self.joypad)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with(cartridge_type: u8) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        const LOGO: [u8; 48] = [
            0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0C,
            0x00, 0x0D, 0x00, 0x08, 0x11, 0x1F, 0x88, 0x89, 0x00, 0x0E, 0xDC, 0xCC, 0x6E, 0xE6,
            0xDD, 0xDD, 0xD9, 0x99, 0xBB, 0xBB, 0x67, 0x63, 0x6E, 0x0E, 0xEC, 0xCC, 0xDD, 0xDC,
            0x99, 0x9F, 0xBB, 0xB9, 0x33, 0x3E,
        ];
        rom[0x0104..0x0104 + LOGO.len()].copy_from_slice(&LOGO);
        rom[0x0147] = cartridge_type;
        rom
    }

    #[test]
    fn div_write_resets_register_to_zero() {
        let mut bus = MemoryBus::load(&rom_with(0x00)).unwrap();
        for _ in 0..10 {
            bus.tick_timer();
        }
        assert_ne!(bus.read_byte(DIV_ADDR), 0);
        bus.write_byte(DIV_ADDR, 0xFF);
        assert_eq!(bus.read_byte(DIV_ADDR), 0);
    }

    #[test]
    fn ly_write_is_forced_to_zero() {
        let mut bus = MemoryBus::load(&rom_with(0x00)).unwrap();
        bus.set_io_reg_direct(LY_ADDR, 0x50);
        bus.write_byte(LY_ADDR, 0x99);
        assert_eq!(bus.read_byte(LY_ADDR), 0);
    }

    #[test]
    fn dma_copies_160_bytes_into_oam() {
        let mut bus = MemoryBus::load(&rom_with(0x00)).unwrap();
        for i in 0..OAM_SIZE {
            bus.write_byte(0xC000 + i as u16, (i & 0xFF) as u8);
        }
        bus.write_byte(DMA_ADDR, 0xC0);
        for i in 0..OAM_SIZE {
            assert_eq!(bus.get_oam()[i], (i & 0xFF) as u8);
        }
    }

    #[test]
    fn unusable_region_ignores_writes_and_reads_ff() {
        let mut bus = MemoryBus::load(&rom_with(0x00)).unwrap();
        bus.write_byte(0xFEA0, 0x42);
        assert_eq!(bus.read_byte(0xFEA0), 0xFF);
    }
}
