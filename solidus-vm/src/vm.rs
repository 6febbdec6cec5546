//! The stack-oriented predicate evaluator itself (`spec.md` §4.1).
//!
//! One `VirtualMachine` runs once per spent input: it is seeded with the
//! input's witness arguments on the main stack, then executes the input's
//! control program against a bounded gas budget. An input is spendable only
//! if the program runs to completion with gas to spare and a non-false top
//! of stack (`I-T5`).

use crate::context::TxContext;
use crate::error::VmError;
use crate::opcode::{self, Opcode, PUSH_COST_PER_BYTE};
use crate::uint256::{self, checked_add, checked_div, checked_mod, checked_mul, checked_shl, checked_shr, checked_sub, to_u256};
use primitive_types::U256;
use solidus_chain::txio::ControlProgram;

/// Upper bound on how many instructions a single run may execute, a
/// defense-in-depth backstop against pathological backward-jump loops on
/// top of the gas budget itself (`spec.md` §9: "must not allow unbounded
/// recursion").
const MAX_STEPS: u64 = 1_000_000;

const TRUE: &[u8] = &[1];

fn as_bool(bytes: &[u8]) -> bool {
    bytes.iter().any(|b| *b != 0)
}

fn bool_bytes(value: bool) -> Vec<u8> {
    if value {
        TRUE.to_vec()
    } else {
        Vec::new()
    }
}

/// The result of a completed VM run: how much gas was actually spent, for
/// `solidus-consensus`'s gas accounting (`spec.md` §4.5 `GasState`).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RunOutcome {
    pub gas_used: u64,
}

pub struct VirtualMachine<'a, C: TxContext> {
    main_stack: Vec<Vec<u8>>,
    alt_stack: Vec<Vec<u8>>,
    gas_remaining: i64,
    gas_used: i64,
    pc: usize,
    program: &'a [u8],
    context: &'a C,
}

impl<'a, C: TxContext> VirtualMachine<'a, C> {
    pub fn new(program: &'a ControlProgram, witness: &[Vec<u8>], gas_limit: u64, context: &'a C) -> Result<Self, VmError> {
        if program.vm_version != 1 {
            return Err(VmError::UnsupportedVmVersion(program.vm_version));
        }
        Ok(VirtualMachine {
            main_stack: witness.to_vec(),
            alt_stack: Vec::new(),
            gas_remaining: gas_limit as i64,
            gas_used: 0,
            pc: 0,
            program: &program.code,
            context,
        })
    }

    fn charge(&mut self, cost: i64) -> Result<(), VmError> {
        self.gas_remaining -= cost;
        self.gas_used += cost;
        if self.gas_remaining < 0 {
            return Err(VmError::GasExceeded);
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<Vec<u8>, VmError> {
        self.main_stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn pop_num(&mut self) -> Result<U256, VmError> {
        let bytes = self.pop()?;
        to_u256(&bytes)
    }

    fn push(&mut self, value: Vec<u8>) {
        self.main_stack.push(value);
    }

    fn push_num(&mut self, value: U256) {
        self.push(uint256::from_u256(value));
    }

    fn push_bool(&mut self, value: bool) {
        self.push(bool_bytes(value));
    }

    /// Runs the program to completion. Returns `Ok` only if the program
    /// ran out without error and the final top of stack is true (I-T5).
    pub fn run(mut self) -> Result<RunOutcome, VmError> {
        let mut steps = 0u64;
        while self.pc < self.program.len() {
            steps += 1;
            if steps > MAX_STEPS {
                return Err(VmError::GasExceeded);
            }
            self.step()?;
        }
        let top = self.main_stack.last().ok_or(VmError::FalseResult)?;
        if as_bool(top) {
            Ok(RunOutcome {
                gas_used: self.gas_used.max(0) as u64,
            })
        } else {
            Err(VmError::FalseResult)
        }
    }

    fn step(&mut self) -> Result<(), VmError> {
        let (op, next_pc) = Opcode::decode(self.program, self.pc)?;
        self.charge(op.base_cost())?;

        match op {
            Opcode::False => self.push(Vec::new()),
            Opcode::True => self.push(TRUE.to_vec()),
            Opcode::PushData(len) => {
                self.charge(len as i64 * PUSH_COST_PER_BYTE)?;
                let end = next_pc + len as usize;
                let data = self
                    .program
                    .get(next_pc..end)
                    .ok_or(VmError::PcOutOfRange)?
                    .to_vec();
                self.push(data);
                self.pc = end;
                return Ok(());
            }
            Opcode::Dup => {
                let top = self.main_stack.last().ok_or(VmError::StackUnderflow)?.clone();
                self.push(top);
            }
            Opcode::Drop => {
                self.pop()?;
            }
            Opcode::Swap => {
                let len = self.main_stack.len();
                if len < 2 {
                    return Err(VmError::StackUnderflow);
                }
                self.main_stack.swap(len - 1, len - 2);
            }
            Opcode::Over => {
                let len = self.main_stack.len();
                if len < 2 {
                    return Err(VmError::StackUnderflow);
                }
                let item = self.main_stack[len - 2].clone();
                self.push(item);
            }
            Opcode::Depth => {
                let depth = self.main_stack.len() as u64;
                self.push_num(U256::from(depth));
            }
            Opcode::ToAltStack => {
                let top = self.pop()?;
                self.alt_stack.push(top);
            }
            Opcode::FromAltStack => {
                let top = self.alt_stack.pop().ok_or(VmError::StackUnderflow)?;
                self.push(top);
            }
            Opcode::Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push_bool(a == b);
            }
            Opcode::Not => {
                let n = self.pop_num()?;
                self.push_bool(n.is_zero());
            }
            Opcode::BoolAnd => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push_bool(as_bool(&a) && as_bool(&b));
            }
            Opcode::BoolOr => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push_bool(as_bool(&a) || as_bool(&b));
            }
            Opcode::Add => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(checked_add(a, b)?);
            }
            Opcode::Sub => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(checked_sub(a, b)?);
            }
            Opcode::Mul => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(checked_mul(a, b)?);
            }
            Opcode::Div => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(checked_div(a, b)?);
            }
            Opcode::Mod => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(checked_mod(a, b)?);
            }
            Opcode::Negate => {
                let n = self.pop_num()?;
                if n.is_zero() {
                    self.push_num(n);
                } else {
                    return Err(VmError::Range);
                }
            }
            Opcode::Abs => {
                let n = self.pop_num()?;
                self.push_num(n);
            }
            Opcode::ShiftLeft => {
                let shift = self.pop_num()?;
                let n = self.pop_num()?;
                self.push_num(checked_shl(n, shift.low_u32()));
            }
            Opcode::ShiftRight => {
                let shift = self.pop_num()?;
                let n = self.pop_num()?;
                self.push_num(checked_shr(n, shift.low_u32()));
            }
            Opcode::NumEqual => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a == b);
            }
            Opcode::LessThan => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a < b);
            }
            Opcode::GreaterThan => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a > b);
            }
            Opcode::Jump(target) => {
                self.pc = target as usize;
                return Ok(());
            }
            Opcode::JumpIf(target) => {
                let cond = self.pop()?;
                if as_bool(&cond) {
                    self.pc = target as usize;
                    return Ok(());
                }
            }
            Opcode::Verify => {
                let cond = self.pop()?;
                if !as_bool(&cond) {
                    return Err(VmError::VerifyFailed);
                }
            }
            Opcode::Fail => return Err(VmError::VerifyFailed),
            Opcode::Return => return Err(VmError::VerifyFailed),
            Opcode::Sha256 => {
                use sha2::{Digest, Sha256};
                let data = self.pop()?;
                self.push(Sha256::digest(&data).to_vec());
            }
            Opcode::Sha3 => {
                use sha3::{Digest, Sha3_256};
                let data = self.pop()?;
                self.push(Sha3_256::digest(&data).to_vec());
            }
            Opcode::CheckSig => {
                self.charge(opcode::CHECKSIG_COST)?;
                let pubkey = self.pop()?;
                let sig = self.pop()?;
                let msg = self.context.tx_sighash();
                self.push_bool(check_sig(&pubkey, &sig, &msg).unwrap_or(false));
            }
            Opcode::CheckOutput => {
                let control_program_bytes = self.pop()?;
                let vm_version = self.pop_num()?.low_u64();
                let amount = self.pop_num()?.low_u64();
                let asset_id_bytes = self.pop()?;
                let index = self.pop_num()?.low_u64();
                if asset_id_bytes.len() != 32 {
                    return Err(VmError::BadValue);
                }
                let mut asset_id = [0u8; 32];
                asset_id.copy_from_slice(&asset_id_bytes);
                let asset_amount = solidus_chain::amount::AssetAmount::new(
                    solidus_chain::amount::AssetId::from_bytes_exact(asset_id),
                    amount,
                );
                let control_program = ControlProgram::new(vm_version, control_program_bytes);
                let ok = self.context.check_output(index, asset_amount, &control_program);
                self.push_bool(ok);
            }
            Opcode::Program => {
                self.push(self.context.current_program().code.clone());
            }
            Opcode::TxSigHash => {
                self.push(self.context.tx_sighash().to_vec());
            }
            Opcode::Amount => {
                self.push_num(U256::from(self.context.current_asset_amount().amount));
            }
            Opcode::AssetId => {
                self.push(self.context.current_asset_amount().asset_id.as_bytes().to_vec());
            }
        }

        self.pc = next_pc;
        Ok(())
    }
}

fn check_sig(pubkey: &[u8], sig: &[u8], msg: &[u8; 32]) -> Option<bool> {
    use secp256k1::{Message, PublicKey, Secp256k1, Signature};
    let secp = Secp256k1::verification_only();
    let pk = PublicKey::from_slice(pubkey).ok()?;
    let sig = Signature::from_der(sig).or_else(|_| Signature::from_compact(sig)).ok()?;
    let msg = Message::from_slice(msg).ok()?;
    Some(secp.verify(&msg, &sig, &pk).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NullContext;
    use solidus_chain::amount::{AssetAmount, AssetId};

    fn ctx() -> NullContext {
        NullContext {
            sighash: [0u8; 32],
            program: ControlProgram::trivial_true(),
            asset_amount: AssetAmount::new(AssetId::NATIVE, 0),
        }
    }

    fn run(code: Vec<u8>, gas: u64) -> Result<RunOutcome, VmError> {
        let program = ControlProgram::new(1, code);
        let context = ctx();
        VirtualMachine::new(&program, &[], gas, &context)?.run()
    }

    #[test]
    fn op_true_satisfies_the_input() {
        assert!(run(vec![0x01], 100).is_ok());
    }

    #[test]
    fn op_false_is_a_false_result() {
        assert_eq!(run(vec![0x00], 100), Err(VmError::FalseResult));
    }

    #[test]
    fn push_one_plus_one_equals_two() {
        // PUSH 1, PUSH 1, ADD, PUSH 2, NUMEQUAL
        let code = vec![0x02, 1, 1, 0x02, 1, 1, 0x70, 0x02, 1, 2, 0x79];
        assert!(run(code, 100).is_ok());
    }

    #[test]
    fn division_by_zero_fails_with_div_zero() {
        let code = vec![0x02, 1, 5, 0x00, 0x73]; // PUSH 5, FALSE(=0), DIV
        assert_eq!(run(code, 100), Err(VmError::DivZero));
    }

    #[test]
    fn running_out_of_gas_is_an_error() {
        assert_eq!(run(vec![0x01], 0), Err(VmError::GasExceeded));
    }

    #[test]
    fn backward_jump_loop_eventually_exhausts_gas() {
        // JUMP 0 forever; each jump costs gas so this can't loop unbounded.
        let code = vec![0x80, 0, 0, 0, 0];
        assert_eq!(run(code, 1000), Err(VmError::GasExceeded));
    }

    #[test]
    fn unrecognized_opcode_is_rejected() {
        assert_eq!(run(vec![0xff], 100), Err(VmError::InvalidOpcode(0xff)));
    }
}
