pub struct ISABuilder<Desc: Clone> {
    instructions: Vec<Desc>,
}

impl<Desc: Clone> ISABuilder<Desc> {
    pub fn new() -> Self {
        ISABuilder {
            instructions: Vec::new(),
        }
    }

    pub fn add(mut self, desc: &[Desc]) -> Self {
        self.instructions.extend_from_slice(desc);
        self
    }

    pub fn build(self) -> Vec<Desc> {
        self.instructions
    }
}

#[macro_export]
macro_rules! define_instr_enum {
    ($isa_name:ident, $($name:ident),* $(,)?) => {
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $isa_name {
            $($name),*
        }

        impl $isa_name {
            pub const ALL: &'static [$isa_name] = &[$($isa_name::$name),*];

            pub fn name(&self) -> &'static str {
                match self {
                    $($isa_name::$name => stringify!($name)),*
                }
            }

            /// Assembly spelling: lower case, `_` becomes `.` (`FENCE_I` is `fence.i`).
            pub fn mnemonic(&self) -> String {
                self.name().to_ascii_lowercase().replace('_', ".")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::isa::instruction::RiscvInstr;

    use super::*;

    #[test]
    fn test_isa_builder_keeps_order() {
        let isa = ISABuilder::new().add(&[1, 2]).add(&[3]).build();
        assert_eq!(isa, vec![1, 2, 3]);
    }

    #[test]
    fn test_instr_names() {
        assert_eq!(RiscvInstr::ADDI.name(), "ADDI");
        assert_eq!(RiscvInstr::ADDI.mnemonic(), "addi");
        assert_eq!(RiscvInstr::FENCE_I.mnemonic(), "fence.i");
        assert_eq!(RiscvInstr::LD.isa_name(), "rv64i");
        assert_eq!(RiscvInstr::MULHSU.isa_name(), "rv32m");
    }
}
