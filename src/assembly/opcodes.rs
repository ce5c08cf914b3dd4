//! CIL opcodes (ECMA-335 III.1.2).
//!
//! [`OpCode`] stores an opcode as a single `u16`: single-byte opcodes keep their byte value
//! (`call` = `0x0028`), two-byte opcodes that use the `0xFE` prefix are stored with the prefix
//! in the high byte (`ceq` = `0xFE01`). Every opcode of the standard is available as an
//! associated constant named after its mnemonic, and [`OpCode::mnemonic`] maps back to the
//! textual form.
//!
//! The rewriting passes only ever inspect a handful of opcodes (the `ldc.i4` family, `call`,
//! `callvirt`, `newobj`, the literal loads and `nop`), but the module codec hands over whole
//! method bodies, so the table is complete.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A CIL opcode, one- or two-byte form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpCode(pub u16);

macro_rules! opcodes {
    ($($(#[$doc:meta])* ($name:ident, $value:literal, $mnemonic:literal),)*) => {
        #[allow(missing_docs)]
        impl OpCode {
            $(pub const $name: OpCode = OpCode($value);)*

            /// Every opcode defined by ECMA-335, in encoding order.
            pub const ALL: &'static [OpCode] = &[$(OpCode::$name,)*];

            /// The textual mnemonic, `None` for values that are not a defined opcode.
            #[must_use]
            pub fn mnemonic(self) -> Option<&'static str> {
                match self {
                    $(OpCode::$name => Some($mnemonic),)*
                    _ => None,
                }
            }

            /// Looks an opcode up by its mnemonic.
            #[must_use]
            pub fn from_mnemonic(mnemonic: &str) -> Option<OpCode> {
                match mnemonic {
                    $($mnemonic => Some(OpCode::$name),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    // Misc
    (NOP, 0x0000, "nop"),
    (BREAK, 0x0001, "break"),
    // Load/store argument shorthand
    (LDARG_0, 0x0002, "ldarg.0"),
    (LDARG_1, 0x0003, "ldarg.1"),
    (LDARG_2, 0x0004, "ldarg.2"),
    (LDARG_3, 0x0005, "ldarg.3"),
    // Load/store local shorthand
    (LDLOC_0, 0x0006, "ldloc.0"),
    (LDLOC_1, 0x0007, "ldloc.1"),
    (LDLOC_2, 0x0008, "ldloc.2"),
    (LDLOC_3, 0x0009, "ldloc.3"),
    (STLOC_0, 0x000A, "stloc.0"),
    (STLOC_1, 0x000B, "stloc.1"),
    (STLOC_2, 0x000C, "stloc.2"),
    (STLOC_3, 0x000D, "stloc.3"),
    // Load/store argument/local (short form)
    (LDARG_S, 0x000E, "ldarg.s"),
    (LDARGA_S, 0x000F, "ldarga.s"),
    (STARG_S, 0x0010, "starg.s"),
    (LDLOC_S, 0x0011, "ldloc.s"),
    (LDLOCA_S, 0x0012, "ldloca.s"),
    (STLOC_S, 0x0013, "stloc.s"),
    // Null / constant loaders
    (LDNULL, 0x0014, "ldnull"),
    (LDC_I4_M1, 0x0015, "ldc.i4.m1"),
    (LDC_I4_0, 0x0016, "ldc.i4.0"),
    (LDC_I4_1, 0x0017, "ldc.i4.1"),
    (LDC_I4_2, 0x0018, "ldc.i4.2"),
    (LDC_I4_3, 0x0019, "ldc.i4.3"),
    (LDC_I4_4, 0x001A, "ldc.i4.4"),
    (LDC_I4_5, 0x001B, "ldc.i4.5"),
    (LDC_I4_6, 0x001C, "ldc.i4.6"),
    (LDC_I4_7, 0x001D, "ldc.i4.7"),
    (LDC_I4_8, 0x001E, "ldc.i4.8"),
    (LDC_I4_S, 0x001F, "ldc.i4.s"),
    (LDC_I4, 0x0020, "ldc.i4"),
    (LDC_I8, 0x0021, "ldc.i8"),
    (LDC_R4, 0x0022, "ldc.r4"),
    (LDC_R8, 0x0023, "ldc.r8"),
    // Stack manipulation
    (DUP, 0x0025, "dup"),
    (POP, 0x0026, "pop"),
    // Call / return
    (JMP, 0x0027, "jmp"),
    (CALL, 0x0028, "call"),
    (CALLI, 0x0029, "calli"),
    (RET, 0x002A, "ret"),
    // Branch (short form)
    (BR_S, 0x002B, "br.s"),
    (BRFALSE_S, 0x002C, "brfalse.s"),
    (BRTRUE_S, 0x002D, "brtrue.s"),
    (BEQ_S, 0x002E, "beq.s"),
    (BGE_S, 0x002F, "bge.s"),
    (BGT_S, 0x0030, "bgt.s"),
    (BLE_S, 0x0031, "ble.s"),
    (BLT_S, 0x0032, "blt.s"),
    (BNE_UN_S, 0x0033, "bne.un.s"),
    (BGE_UN_S, 0x0034, "bge.un.s"),
    (BGT_UN_S, 0x0035, "bgt.un.s"),
    (BLE_UN_S, 0x0036, "ble.un.s"),
    (BLT_UN_S, 0x0037, "blt.un.s"),
    // Branch (long form)
    (BR, 0x0038, "br"),
    (BRFALSE, 0x0039, "brfalse"),
    (BRTRUE, 0x003A, "brtrue"),
    (BEQ, 0x003B, "beq"),
    (BGE, 0x003C, "bge"),
    (BGT, 0x003D, "bgt"),
    (BLE, 0x003E, "ble"),
    (BLT, 0x003F, "blt"),
    (BNE_UN, 0x0040, "bne.un"),
    (BGE_UN, 0x0041, "bge.un"),
    (BGT_UN, 0x0042, "bgt.un"),
    (BLE_UN, 0x0043, "ble.un"),
    (BLT_UN, 0x0044, "blt.un"),
    // Switch
    (SWITCH, 0x0045, "switch"),
    // Indirect load (ldind.*)
    (LDIND_I1, 0x0046, "ldind.i1"),
    (LDIND_U1, 0x0047, "ldind.u1"),
    (LDIND_I2, 0x0048, "ldind.i2"),
    (LDIND_U2, 0x0049, "ldind.u2"),
    (LDIND_I4, 0x004A, "ldind.i4"),
    (LDIND_U4, 0x004B, "ldind.u4"),
    (LDIND_I8, 0x004C, "ldind.i8"),
    (LDIND_I, 0x004D, "ldind.i"),
    (LDIND_R4, 0x004E, "ldind.r4"),
    (LDIND_R8, 0x004F, "ldind.r8"),
    (LDIND_REF, 0x0050, "ldind.ref"),
    // Indirect store (stind.*)
    (STIND_REF, 0x0051, "stind.ref"),
    (STIND_I1, 0x0052, "stind.i1"),
    (STIND_I2, 0x0053, "stind.i2"),
    (STIND_I4, 0x0054, "stind.i4"),
    (STIND_I8, 0x0055, "stind.i8"),
    (STIND_R4, 0x0056, "stind.r4"),
    (STIND_R8, 0x0057, "stind.r8"),
    // Arithmetic
    (ADD, 0x0058, "add"),
    (SUB, 0x0059, "sub"),
    (MUL, 0x005A, "mul"),
    (DIV, 0x005B, "div"),
    (DIV_UN, 0x005C, "div.un"),
    (REM, 0x005D, "rem"),
    (REM_UN, 0x005E, "rem.un"),
    // Bitwise / logical
    (AND, 0x005F, "and"),
    (OR, 0x0060, "or"),
    (XOR, 0x0061, "xor"),
    (SHL, 0x0062, "shl"),
    (SHR, 0x0063, "shr"),
    (SHR_UN, 0x0064, "shr.un"),
    (NEG, 0x0065, "neg"),
    (NOT, 0x0066, "not"),
    // Conversion
    (CONV_I1, 0x0067, "conv.i1"),
    (CONV_I2, 0x0068, "conv.i2"),
    (CONV_I4, 0x0069, "conv.i4"),
    (CONV_I8, 0x006A, "conv.i8"),
    (CONV_R4, 0x006B, "conv.r4"),
    (CONV_R8, 0x006C, "conv.r8"),
    (CONV_U4, 0x006D, "conv.u4"),
    (CONV_U8, 0x006E, "conv.u8"),
    // Virtual call / object model
    (CALLVIRT, 0x006F, "callvirt"),
    (CPOBJ, 0x0070, "cpobj"),
    (LDOBJ, 0x0071, "ldobj"),
    (LDSTR, 0x0072, "ldstr"),
    (NEWOBJ, 0x0073, "newobj"),
    (CASTCLASS, 0x0074, "castclass"),
    (ISINST, 0x0075, "isinst"),
    (CONV_R_UN, 0x0076, "conv.r.un"),
    // Boxing / unboxing
    (UNBOX, 0x0079, "unbox"),
    // Exception
    (THROW, 0x007A, "throw"),
    // Field access
    (LDFLD, 0x007B, "ldfld"),
    (LDFLDA, 0x007C, "ldflda"),
    (STFLD, 0x007D, "stfld"),
    (LDSFLD, 0x007E, "ldsfld"),
    (LDSFLDA, 0x007F, "ldsflda"),
    (STSFLD, 0x0080, "stsfld"),
    // Object store
    (STOBJ, 0x0081, "stobj"),
    // Overflow conversion (unsigned source)
    (CONV_OVF_I1_UN, 0x0082, "conv.ovf.i1.un"),
    (CONV_OVF_I2_UN, 0x0083, "conv.ovf.i2.un"),
    (CONV_OVF_I4_UN, 0x0084, "conv.ovf.i4.un"),
    (CONV_OVF_I8_UN, 0x0085, "conv.ovf.i8.un"),
    (CONV_OVF_U1_UN, 0x0086, "conv.ovf.u1.un"),
    (CONV_OVF_U2_UN, 0x0087, "conv.ovf.u2.un"),
    (CONV_OVF_U4_UN, 0x0088, "conv.ovf.u4.un"),
    (CONV_OVF_U8_UN, 0x0089, "conv.ovf.u8.un"),
    (CONV_OVF_I_UN, 0x008A, "conv.ovf.i.un"),
    (CONV_OVF_U_UN, 0x008B, "conv.ovf.u.un"),
    // Boxing / arrays
    (BOX, 0x008C, "box"),
    (NEWARR, 0x008D, "newarr"),
    (LDLEN, 0x008E, "ldlen"),
    (LDELEMA, 0x008F, "ldelema"),
    // Array element load
    (LDELEM_I1, 0x0090, "ldelem.i1"),
    (LDELEM_U1, 0x0091, "ldelem.u1"),
    (LDELEM_I2, 0x0092, "ldelem.i2"),
    (LDELEM_U2, 0x0093, "ldelem.u2"),
    (LDELEM_I4, 0x0094, "ldelem.i4"),
    (LDELEM_U4, 0x0095, "ldelem.u4"),
    (LDELEM_I8, 0x0096, "ldelem.i8"),
    (LDELEM_I, 0x0097, "ldelem.i"),
    (LDELEM_R4, 0x0098, "ldelem.r4"),
    (LDELEM_R8, 0x0099, "ldelem.r8"),
    (LDELEM_REF, 0x009A, "ldelem.ref"),
    // Array element store
    (STELEM_I, 0x009B, "stelem.i"),
    (STELEM_I1, 0x009C, "stelem.i1"),
    (STELEM_I2, 0x009D, "stelem.i2"),
    (STELEM_I4, 0x009E, "stelem.i4"),
    (STELEM_I8, 0x009F, "stelem.i8"),
    (STELEM_R4, 0x00A0, "stelem.r4"),
    (STELEM_R8, 0x00A1, "stelem.r8"),
    (STELEM_REF, 0x00A2, "stelem.ref"),
    // Generic array element access
    (LDELEM, 0x00A3, "ldelem"),
    (STELEM, 0x00A4, "stelem"),
    (UNBOX_ANY, 0x00A5, "unbox.any"),
    // Overflow conversion (signed source)
    (CONV_OVF_I1, 0x00B3, "conv.ovf.i1"),
    (CONV_OVF_U1, 0x00B4, "conv.ovf.u1"),
    (CONV_OVF_I2, 0x00B5, "conv.ovf.i2"),
    (CONV_OVF_U2, 0x00B6, "conv.ovf.u2"),
    (CONV_OVF_I4, 0x00B7, "conv.ovf.i4"),
    (CONV_OVF_U4, 0x00B8, "conv.ovf.u4"),
    (CONV_OVF_I8, 0x00B9, "conv.ovf.i8"),
    (CONV_OVF_U8, 0x00BA, "conv.ovf.u8"),
    // Typed reference
    (REFANYVAL, 0x00C2, "refanyval"),
    (CKFINITE, 0x00C3, "ckfinite"),
    (MKREFANY, 0x00C6, "mkrefany"),
    // Token / conversion
    (LDTOKEN, 0x00D0, "ldtoken"),
    (CONV_U2, 0x00D1, "conv.u2"),
    (CONV_U1, 0x00D2, "conv.u1"),
    (CONV_I, 0x00D3, "conv.i"),
    (CONV_OVF_I, 0x00D4, "conv.ovf.i"),
    (CONV_OVF_U, 0x00D5, "conv.ovf.u"),
    // Overflow arithmetic
    (ADD_OVF, 0x00D6, "add.ovf"),
    (ADD_OVF_UN, 0x00D7, "add.ovf.un"),
    (MUL_OVF, 0x00D8, "mul.ovf"),
    (MUL_OVF_UN, 0x00D9, "mul.ovf.un"),
    (SUB_OVF, 0x00DA, "sub.ovf"),
    (SUB_OVF_UN, 0x00DB, "sub.ovf.un"),
    // Exception handling
    (ENDFINALLY, 0x00DC, "endfinally"),
    (LEAVE, 0x00DD, "leave"),
    (LEAVE_S, 0x00DE, "leave.s"),
    // Indirect store / conversion
    (STIND_I, 0x00DF, "stind.i"),
    (CONV_U, 0x00E0, "conv.u"),
    (ARGLIST, 0xFE00, "arglist"),
    (CEQ, 0xFE01, "ceq"),
    (CGT, 0xFE02, "cgt"),
    (CGT_UN, 0xFE03, "cgt.un"),
    (CLT, 0xFE04, "clt"),
    (CLT_UN, 0xFE05, "clt.un"),
    (LDFTN, 0xFE06, "ldftn"),
    (LDVIRTFTN, 0xFE07, "ldvirtftn"),
    (LDARG, 0xFE09, "ldarg"),
    (LDARGA, 0xFE0A, "ldarga"),
    (STARG, 0xFE0B, "starg"),
    (LDLOC, 0xFE0C, "ldloc"),
    (LDLOCA, 0xFE0D, "ldloca"),
    (STLOC, 0xFE0E, "stloc"),
    (LOCALLOC, 0xFE0F, "localloc"),
    (ENDFILTER, 0xFE11, "endfilter"),
    (UNALIGNED, 0xFE12, "unaligned."),
    (VOLATILE, 0xFE13, "volatile."),
    (TAIL, 0xFE14, "tail."),
    (INITOBJ, 0xFE15, "initobj"),
    (CONSTRAINED, 0xFE16, "constrained."),
    (CPBLK, 0xFE17, "cpblk"),
    (INITBLK, 0xFE18, "initblk"),
    (RETHROW, 0xFE1A, "rethrow"),
    (SIZEOF, 0xFE1C, "sizeof"),
    (REFANYTYPE, 0xFE1D, "refanytype"),
    (READONLY, 0xFE1E, "readonly."),
}

impl OpCode {
    /// Prefix byte shared by all two-byte opcodes
    pub const FE_PREFIX: u8 = 0xFE;

    /// Returns true if this opcode is encoded with the `0xFE` prefix
    #[must_use]
    pub fn is_two_byte(self) -> bool {
        (self.0 >> 8) as u8 == Self::FE_PREFIX
    }

    /// Returns true for `call` and `callvirt`
    #[must_use]
    pub fn is_call(self) -> bool {
        self == OpCode::CALL || self == OpCode::CALLVIRT
    }

    /// Returns true for every form of `ldc.i4`: `ldc.i4.m1` to `ldc.i4.8`, `ldc.i4.s` and `ldc.i4`
    #[must_use]
    pub fn is_ldc_i4(self) -> bool {
        (OpCode::LDC_I4_M1.0..=OpCode::LDC_I4.0).contains(&self.0)
    }

    /// The constant pushed by the short `ldc.i4` forms that carry no operand.
    ///
    /// Returns `None` for `ldc.i4.s`, `ldc.i4` and every other opcode.
    #[must_use]
    pub fn implicit_i4(self) -> Option<i32> {
        if (OpCode::LDC_I4_M1.0..=OpCode::LDC_I4_8.0).contains(&self.0) {
            Some(i32::from(self.0) - i32::from(OpCode::LDC_I4_0.0))
        } else {
            None
        }
    }

    /// Returns true for the prefix opcodes that modify the following instruction
    #[must_use]
    pub fn is_prefix(self) -> bool {
        matches!(
            self,
            OpCode::UNALIGNED
                | OpCode::VOLATILE
                | OpCode::TAIL
                | OpCode::CONSTRAINED
                | OpCode::READONLY
        )
    }
}

impl fmt::Debug for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(mnemonic) => write!(f, "OpCode({mnemonic}, 0x{:04X})", self.0),
            None => write!(f, "OpCode(0x{:04X})", self.0),
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(mnemonic) => f.write_str(mnemonic),
            None => write!(f, "<0x{:04X}>", self.0),
        }
    }
}
