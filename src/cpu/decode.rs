//! Opcode decode: primary table and CB-prefixed table.
//!
//! Decoding follows the classic Z80-family bit decomposition
//! `x = op>>6, y = (op>>3)&7, z = op&7, p = y>>1, q = y&1` rather than the
//! reference crate's one-function-per-opcode dispatch table. Instructions
//! that need more than the fetch's own bus access push closures onto
//! `cpu.pipeline`; the rest execute fully during decode.

use super::constants::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z};
use super::{Cpu, Step};
use crate::memory_bus::MemoryBus;
use crate::memory_map::{IF_ADDR, INTERRUPT_ENABLE_REGISTER};
use log;

fn read_r8(cpu: &Cpu, bus: &MemoryBus, idx: u8) -> u8 {
    match idx {
        0 => cpu.b,
        1 => cpu.c,
        2 => cpu.d,
        3 => cpu.e,
        4 => cpu.h,
        5 => cpu.l,
        6 => bus.read_byte(cpu.get_hl()),
        7 => cpu.a,
        _ => unreachable!(),
    }
}

fn write_r8(cpu: &mut Cpu, bus: &mut MemoryBus, idx: u8, value: u8) {
    match idx {
        0 => cpu.b = value,
        1 => cpu.c = value,
        2 => cpu.d = value,
        3 => cpu.e = value,
        4 => cpu.h = value,
        5 => cpu.l = value,
        6 => bus.write_byte(cpu.get_hl(), value),
        7 => cpu.a = value,
        _ => unreachable!(),
    }
}

fn get_r16(cpu: &Cpu, idx: u8) -> u16 {
    match idx {
        0 => cpu.get_bc(),
        1 => cpu.get_de(),
        2 => cpu.get_hl(),
        3 => cpu.sp,
        _ => unreachable!(),
    }
}

fn set_r16(cpu: &mut Cpu, idx: u8, value: u16) {
    match idx {
        0 => cpu.set_bc(value),
        1 => cpu.set_de(value),
        2 => cpu.set_hl(value),
        3 => cpu.sp = value,
        _ => unreachable!(),
    }
}

fn get_r16stk(cpu: &Cpu, idx: u8) -> u16 {
    match idx {
        0 => cpu.get_bc(),
        1 => cpu.get_de(),
        2 => cpu.get_hl(),
        3 => cpu.get_af(),
        _ => unreachable!(),
    }
}

fn set_r16stk(cpu: &mut Cpu, idx: u8, value: u16) {
    match idx {
        0 => cpu.set_bc(value),
        1 => cpu.set_de(value),
        2 => cpu.set_hl(value),
        3 => cpu.set_af(value),
        _ => unreachable!(),
    }
}

fn check_cond(cpu: &Cpu, idx: u8) -> bool {
    match idx {
        0 => !cpu.get_flag(FLAG_Z),
        1 => cpu.get_flag(FLAG_Z),
        2 => !cpu.get_flag(FLAG_C),
        3 => cpu.get_flag(FLAG_C),
        _ => unreachable!(),
    }
}

fn alu_op(cpu: &mut Cpu, op: u8, value: u8) {
    match op {
        0 => cpu.add_a(value, false),
        1 => cpu.add_a(value, true),
        2 => cpu.sub_a(value, false, true),
        3 => cpu.sub_a(value, true, true),
        4 => cpu.and_a(value),
        5 => cpu.xor_a(value),
        6 => cpu.or_a(value),
        7 => cpu.cp_a(value),
        _ => unreachable!(),
    }
}

fn cb_rot(cpu: &mut Cpu, op: u8, value: u8) -> u8 {
    match op {
        0 => cpu.rlc(value),
        1 => cpu.rrc(value),
        2 => cpu.rl(value),
        3 => cpu.rr(value),
        4 => cpu.sla(value),
        5 => cpu.sra(value),
        6 => cpu.swap(value),
        7 => cpu.srl(value),
        _ => unreachable!(),
    }
}

fn read_operand_lo(cpu: &mut Cpu, bus: &mut MemoryBus) {
    cpu.temp_lo = bus.read_byte(cpu.pc);
    cpu.pc = cpu.pc.wrapping_add(1);
}

fn read_operand_hi(cpu: &mut Cpu, bus: &mut MemoryBus) {
    cpu.temp_hi = bus.read_byte(cpu.pc);
    cpu.pc = cpu.pc.wrapping_add(1);
}

fn temp_word(cpu: &Cpu) -> u16 {
    u16::from_le_bytes([cpu.temp_lo, cpu.temp_hi])
}

fn push_step(cpu: &mut Cpu, step: Step) {
    cpu.pipeline.push_back(step);
}

fn interrupt_pending(bus: &MemoryBus) -> bool {
    let ie = bus.read_byte(INTERRUPT_ENABLE_REGISTER);
    let iflags = bus.read_byte(IF_ADDR);
    ie & iflags & 0x1F != 0
}

pub(super) fn decode_primary(cpu: &mut Cpu, bus: &mut MemoryBus, opcode: u8) {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;
    let p = y >> 1;
    let q = y & 1;

    match x {
        0 => decode_x0(cpu, bus, y, z, p, q),
        1 => decode_x1(cpu, bus, y, z),
        2 => decode_x2(cpu, bus, y, z),
        3 => decode_x3(cpu, bus, y, z, p, q),
        _ => unreachable!(),
    }
}

fn decode_x0(cpu: &mut Cpu, bus: &mut MemoryBus, y: u8, z: u8, p: u8, q: u8) {
    match z {
        0 => match y {
            0 => {} // NOP
            1 => {
                // LD (a16), SP
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(read_operand_hi));
                push_step(cpu, Box::new(|cpu, bus| {
                    let addr = temp_word(cpu);
                    bus.write_byte(addr, (cpu.sp & 0xFF) as u8);
                }));
                push_step(cpu, Box::new(|cpu, bus| {
                    let addr = temp_word(cpu).wrapping_add(1);
                    bus.write_byte(addr, (cpu.sp >> 8) as u8);
                }));
            }
            2 => {
                // STOP
                push_step(cpu, Box::new(|cpu, bus| {
                    let _padding = bus.read_byte(cpu.pc);
                    cpu.pc = cpu.pc.wrapping_add(1);
                    cpu.stopped = true;
                }));
            }
            3 => {
                // JR r8, unconditional
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(|cpu, _bus| {
                    let offset = cpu.temp_lo as i8 as i16;
                    cpu.pc = (cpu.pc as i16).wrapping_add(offset) as u16;
                }));
            }
            4..=7 => {
                // JR cc, r8
                let cond = y - 4;
                push_step(cpu, Box::new(move |cpu, bus| {
                    read_operand_lo(cpu, bus);
                    if check_cond(cpu, cond) {
                        let offset = cpu.temp_lo as i8 as i16;
                        push_step(cpu, Box::new(move |cpu, _bus| {
                            cpu.pc = (cpu.pc as i16).wrapping_add(offset) as u16;
                        }));
                    }
                }));
            }
            _ => unreachable!(),
        },
        1 => {
            if q == 0 {
                // LD r16, d16
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(move |cpu, bus| {
                    read_operand_hi(cpu, bus);
                    set_r16(cpu, p, temp_word(cpu));
                }));
            } else {
                // ADD HL, r16
                push_step(cpu, Box::new(move |cpu, _bus| {
                    cpu.add_hl(get_r16(cpu, p));
                }));
            }
        }
        2 => {
            let use_a_reg = q == 1;
            push_step(cpu, Box::new(move |cpu, bus| {
                let addr = match p {
                    0 => cpu.get_bc(),
                    1 => cpu.get_de(),
                    2 => {
                        let hl = cpu.get_hl();
                        cpu.set_hl(hl.wrapping_add(1));
                        hl
                    }
                    3 => {
                        let hl = cpu.get_hl();
                        cpu.set_hl(hl.wrapping_sub(1));
                        hl
                    }
                    _ => unreachable!(),
                };
                if use_a_reg {
                    cpu.a = bus.read_byte(addr);
                } else {
                    bus.write_byte(addr, cpu.a);
                }
            }));
        }
        3 => {
            push_step(cpu, Box::new(move |cpu, _bus| {
                let value = get_r16(cpu, p);
                set_r16(cpu, p, if q == 0 { value.wrapping_add(1) } else { value.wrapping_sub(1) });
            }));
        }
        4 => {
            if y == 6 {
                push_step(cpu, Box::new(|cpu, bus| {
                    cpu.temp_lo = bus.read_byte(cpu.get_hl());
                }));
                push_step(cpu, Box::new(|cpu, bus| {
                    let result = cpu.inc_u8(cpu.temp_lo);
                    bus.write_byte(cpu.get_hl(), result);
                }));
            } else {
                let value = read_r8(cpu, bus, y);
                let result = cpu.inc_u8(value);
                write_r8(cpu, bus, y, result);
            }
        }
        5 => {
            if y == 6 {
                push_step(cpu, Box::new(|cpu, bus| {
                    cpu.temp_lo = bus.read_byte(cpu.get_hl());
                }));
                push_step(cpu, Box::new(|cpu, bus| {
                    let result = cpu.dec_u8(cpu.temp_lo);
                    bus.write_byte(cpu.get_hl(), result);
                }));
            } else {
                let value = read_r8(cpu, bus, y);
                let result = cpu.dec_u8(value);
                write_r8(cpu, bus, y, result);
            }
        }
        6 => {
            if y == 6 {
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(|cpu, bus| {
                    bus.write_byte(cpu.get_hl(), cpu.temp_lo);
                }));
            } else {
                push_step(cpu, Box::new(move |cpu, bus| {
                    let value = bus.read_byte(cpu.pc);
                    cpu.pc = cpu.pc.wrapping_add(1);
                    write_r8(cpu, bus, y, value);
                }));
            }
        }
        7 => match y {
            0 => {
                let result = cpu.rlc(cpu.a);
                cpu.a = result;
                cpu.set_flag(FLAG_Z, false);
            }
            1 => {
                let result = cpu.rrc(cpu.a);
                cpu.a = result;
                cpu.set_flag(FLAG_Z, false);
            }
            2 => {
                let result = cpu.rl(cpu.a);
                cpu.a = result;
                cpu.set_flag(FLAG_Z, false);
            }
            3 => {
                let result = cpu.rr(cpu.a);
                cpu.a = result;
                cpu.set_flag(FLAG_Z, false);
            }
            4 => cpu.daa(),
            5 => {
                cpu.a = !cpu.a;
                cpu.set_flag(FLAG_N, true);
                cpu.set_flag(FLAG_H, true);
            }
            6 => {
                cpu.set_flag(FLAG_N, false);
                cpu.set_flag(FLAG_H, false);
                cpu.set_flag(FLAG_C, true);
            }
            7 => {
                let carry = cpu.get_flag(FLAG_C);
                cpu.set_flag(FLAG_N, false);
                cpu.set_flag(FLAG_H, false);
                cpu.set_flag(FLAG_C, !carry);
            }
            _ => unreachable!(),
        },
        _ => unreachable!(),
    }
}

fn decode_x1(cpu: &mut Cpu, bus: &mut MemoryBus, y: u8, z: u8) {
    if y == 6 && z == 6 {
        // HALT, with the documented halt-bug edge case.
        if !cpu.ime && interrupt_pending(bus) {
            cpu.halt_bug = true;
        } else {
            cpu.halted = true;
        }
        return;
    }
    if y == 6 {
        let src = read_r8(cpu, bus, z);
        push_step(cpu, Box::new(move |cpu, bus| {
            bus.write_byte(cpu.get_hl(), src);
        }));
    } else if z == 6 {
        push_step(cpu, Box::new(move |cpu, bus| {
            let value = bus.read_byte(cpu.get_hl());
            write_r8(cpu, bus, y, value);
        }));
    } else {
        let value = read_r8(cpu, bus, z);
        write_r8(cpu, bus, y, value);
    }
}

fn decode_x2(cpu: &mut Cpu, bus: &mut MemoryBus, y: u8, z: u8) {
    if z == 6 {
        push_step(cpu, Box::new(move |cpu, bus| {
            let value = bus.read_byte(cpu.get_hl());
            alu_op(cpu, y, value);
        }));
    } else {
        let value = read_r8(cpu, bus, z);
        alu_op(cpu, y, value);
    }
}

fn decode_x3(cpu: &mut Cpu, bus: &mut MemoryBus, y: u8, z: u8, p: u8, q: u8) {
    let _ = bus;
    match z {
        0 => match y {
            0..=3 => {
                // RET cc
                let cond = y;
                push_step(cpu, Box::new(move |cpu, _bus| {
                    if check_cond(cpu, cond) {
                        push_step(cpu, Box::new(|cpu, bus| {
                            cpu.temp_lo = bus.read_byte(cpu.sp);
                            cpu.sp = cpu.sp.wrapping_add(1);
                        }));
                        push_step(cpu, Box::new(|cpu, bus| {
                            cpu.temp_hi = bus.read_byte(cpu.sp);
                            cpu.sp = cpu.sp.wrapping_add(1);
                        }));
                        push_step(cpu, Box::new(|cpu, _bus| {
                            cpu.pc = temp_word(cpu);
                        }));
                    }
                }));
            }
            4 => {
                // LDH (a8), A
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(|cpu, bus| {
                    let addr = 0xFF00u16 | cpu.temp_lo as u16;
                    bus.write_byte(addr, cpu.a);
                }));
            }
            5 => {
                // ADD SP, r8
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(|_cpu, _bus| {}));
                push_step(cpu, Box::new(|cpu, _bus| {
                    let offset = cpu.temp_lo as i8;
                    cpu.sp = cpu.add_sp_signed(offset);
                }));
            }
            6 => {
                // LDH A, (a8)
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(|cpu, bus| {
                    let addr = 0xFF00u16 | cpu.temp_lo as u16;
                    cpu.a = bus.read_byte(addr);
                }));
            }
            7 => {
                // LD HL, SP+r8
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(|cpu, _bus| {
                    let offset = cpu.temp_lo as i8;
                    let result = cpu.add_sp_signed(offset);
                    cpu.set_hl(result);
                }));
            }
            _ => unreachable!(),
        },
        1 => {
            if q == 0 {
                // POP r16stk
                push_step(cpu, Box::new(|cpu, bus| {
                    cpu.temp_lo = bus.read_byte(cpu.sp);
                    cpu.sp = cpu.sp.wrapping_add(1);
                }));
                push_step(cpu, Box::new(move |cpu, bus| {
                    cpu.temp_hi = bus.read_byte(cpu.sp);
                    cpu.sp = cpu.sp.wrapping_add(1);
                    set_r16stk(cpu, p, temp_word(cpu));
                }));
            } else {
                match p {
                    0 | 1 => {
                        // RET / RETI
                        let is_reti = p == 1;
                        push_step(cpu, Box::new(|cpu, bus| {
                            cpu.temp_lo = bus.read_byte(cpu.sp);
                            cpu.sp = cpu.sp.wrapping_add(1);
                        }));
                        push_step(cpu, Box::new(|cpu, bus| {
                            cpu.temp_hi = bus.read_byte(cpu.sp);
                            cpu.sp = cpu.sp.wrapping_add(1);
                        }));
                        push_step(cpu, Box::new(move |cpu, _bus| {
                            cpu.pc = temp_word(cpu);
                            if is_reti {
                                cpu.ime = true;
                            }
                        }));
                    }
                    2 => cpu.pc = cpu.get_hl(), // JP HL
                    3 => {
                        // LD SP, HL
                        push_step(cpu, Box::new(|cpu, _bus| {
                            cpu.sp = cpu.get_hl();
                        }));
                    }
                    _ => unreachable!(),
                }
            }
        }
        2 => {
            if q == 0 {
                // JP cc, a16
                let cond = y;
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(move |cpu, bus| {
                    read_operand_hi(cpu, bus);
                    if check_cond(cpu, cond) {
                        push_step(cpu, Box::new(|cpu, _bus| {
                            cpu.pc = temp_word(cpu);
                        }));
                    }
                }));
            } else {
                match y {
                    4 => push_step(cpu, Box::new(|cpu, bus| {
                        bus.write_byte(0xFF00 | cpu.c as u16, cpu.a);
                    })),
                    5 => {
                        push_step(cpu, Box::new(read_operand_lo));
                        push_step(cpu, Box::new(read_operand_hi));
                        push_step(cpu, Box::new(|cpu, bus| {
                            bus.write_byte(temp_word(cpu), cpu.a);
                        }));
                    }
                    6 => push_step(cpu, Box::new(|cpu, bus| {
                        cpu.a = bus.read_byte(0xFF00 | cpu.c as u16);
                    })),
                    7 => {
                        push_step(cpu, Box::new(read_operand_lo));
                        push_step(cpu, Box::new(read_operand_hi));
                        push_step(cpu, Box::new(|cpu, bus| {
                            cpu.a = bus.read_byte(temp_word(cpu));
                        }));
                    }
                    _ => unreachable!(),
                }
            }
        }
        3 => match y {
            0 => {
                // JP a16
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(read_operand_hi));
                push_step(cpu, Box::new(|cpu, _bus| {
                    cpu.pc = temp_word(cpu);
                }));
            }
            1 => cpu.extended = true, // CB prefix
            2 | 3 | 4 | 5 => {
                log::error!("illegal opcode 0x{:02X} at {:#06X}", 0xC3 + 8 * y, cpu.instruction_pc);
                cpu.halted = true;
            }
            6 => cpu.ime = false, // DI
            7 => cpu.ime = true,  // EI, applied immediately
            _ => unreachable!(),
        },
        4 => {
            if y <= 3 {
                // CALL cc, a16
                let cond = y;
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(move |cpu, bus| {
                    read_operand_hi(cpu, bus);
                    if check_cond(cpu, cond) {
                        push_step(cpu, Box::new(|_cpu, _bus| {}));
                        push_step(cpu, Box::new(|cpu, bus| {
                            cpu.sp = cpu.sp.wrapping_sub(1);
                            bus.write_byte(cpu.sp, (cpu.pc >> 8) as u8);
                        }));
                        push_step(cpu, Box::new(|cpu, bus| {
                            cpu.sp = cpu.sp.wrapping_sub(1);
                            bus.write_byte(cpu.sp, (cpu.pc & 0xFF) as u8);
                            cpu.pc = temp_word(cpu);
                        }));
                    }
                }));
            } else {
                log::error!("illegal opcode 0x{:02X} at {:#06X}", 0xC4 + 8 * y, cpu.instruction_pc);
                cpu.halted = true;
            }
        }
        5 => {
            if q == 0 {
                // PUSH r16stk
                push_step(cpu, Box::new(|cpu, _bus| {
                    cpu.sp = cpu.sp.wrapping_sub(1);
                }));
                push_step(cpu, Box::new(move |cpu, bus| {
                    let value = get_r16stk(cpu, p);
                    bus.write_byte(cpu.sp, (value >> 8) as u8);
                }));
                push_step(cpu, Box::new(move |cpu, bus| {
                    let value = get_r16stk(cpu, p);
                    cpu.sp = cpu.sp.wrapping_sub(1);
                    bus.write_byte(cpu.sp, (value & 0xFF) as u8);
                }));
            } else if y == 1 {
                // CALL a16
                push_step(cpu, Box::new(read_operand_lo));
                push_step(cpu, Box::new(read_operand_hi));
                push_step(cpu, Box::new(|_cpu, _bus| {}));
                push_step(cpu, Box::new(|cpu, bus| {
                    cpu.sp = cpu.sp.wrapping_sub(1);
                    bus.write_byte(cpu.sp, (cpu.pc >> 8) as u8);
                }));
                push_step(cpu, Box::new(|cpu, bus| {
                    cpu.sp = cpu.sp.wrapping_sub(1);
                    bus.write_byte(cpu.sp, (cpu.pc & 0xFF) as u8);
                    cpu.pc = temp_word(cpu);
                }));
            } else {
                log::error!("illegal opcode 0x{:02X} at {:#06X}", 0xC5 + 8 * y, cpu.instruction_pc);
                cpu.halted = true;
            }
        }
        6 => {
            push_step(cpu, Box::new(move |cpu, bus| {
                let value = bus.read_byte(cpu.pc);
                cpu.pc = cpu.pc.wrapping_add(1);
                alu_op(cpu, y, value);
            }));
        }
        7 => {
            let vector = (y as u16) * 8;
            push_step(cpu, Box::new(|_cpu, _bus| {}));
            push_step(cpu, Box::new(|cpu, bus| {
                cpu.sp = cpu.sp.wrapping_sub(1);
                bus.write_byte(cpu.sp, (cpu.pc >> 8) as u8);
            }));
            push_step(cpu, Box::new(move |cpu, bus| {
                cpu.sp = cpu.sp.wrapping_sub(1);
                bus.write_byte(cpu.sp, (cpu.pc & 0xFF) as u8);
                cpu.pc = vector;
            }));
        }
        _ => unreachable!(),
    }
}

pub(super) fn decode_cb(cpu: &mut Cpu, bus: &mut MemoryBus, opcode: u8) {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;

    match x {
        0 => {
            if z == 6 {
                push_step(cpu, Box::new(|cpu, bus| {
                    cpu.temp_lo = bus.read_byte(cpu.get_hl());
                }));
                push_step(cpu, Box::new(move |cpu, bus| {
                    let result = cb_rot(cpu, y, cpu.temp_lo);
                    bus.write_byte(cpu.get_hl(), result);
                }));
            } else {
                let value = read_r8(cpu, bus, z);
                let result = cb_rot(cpu, y, value);
                write_r8(cpu, bus, z, result);
            }
        }
        1 => {
            if z == 6 {
                push_step(cpu, Box::new(move |cpu, bus| {
                    let value = bus.read_byte(cpu.get_hl());
                    cpu.op_bit(y, value);
                }));
            } else {
                let value = read_r8(cpu, bus, z);
                cpu.op_bit(y, value);
            }
        }
        2 => {
            if z == 6 {
                push_step(cpu, Box::new(|cpu, bus| {
                    cpu.temp_lo = bus.read_byte(cpu.get_hl());
                }));
                push_step(cpu, Box::new(move |cpu, bus| {
                    let result = cpu.temp_lo & !(1 << y);
                    bus.write_byte(cpu.get_hl(), result);
                }));
            } else {
                let value = read_r8(cpu, bus, z);
                write_r8(cpu, bus, z, value & !(1 << y));
            }
        }
        3 => {
            if z == 6 {
                push_step(cpu, Box::new(|cpu, bus| {
                    cpu.temp_lo = bus.read_byte(cpu.get_hl());
                }));
                push_step(cpu, Box::new(move |cpu, bus| {
                    let result = cpu.temp_lo | (1 << y);
                    bus.write_byte(cpu.get_hl(), result);
                }));
            } else {
                let value = read_r8(cpu, bus, z);
                write_r8(cpu, bus, z, value | (1 << y));
            }
        }
        _ => unreachable!(),
    }
}
