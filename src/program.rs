use crate::{
    air::{Air, AreaAttr, Node},
    breakpoint::{Breakpoint, Breakpoints},
    error::{self, BuildError, ExecError},
    instruction::Instruction,
    memory::{Memory, DEFAULT_SIZE},
    operand::Target,
    parser::AsmParser,
    registers::{RegisterFile, RegisterSnapshot},
    span::Span,
    symbol::SymbolTable,
};

/// Result of a single step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepOutcome {
    Continued,
    /// Execution paused: `BKPT`, a user breakpoint or the end of the code.
    Breakpoint,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProgramState {
    /// Nothing compiled yet.
    Loading,
    /// Registers zeroed, PC at the first instruction.
    Ready,
    Running,
    /// Paused at a breakpoint, stopped by an error or by [`Program::halt`].
    Halted,
}

/// Which kind of AREA the loader is currently in.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Section {
    None,
    Code,
    Data,
}

/// An assembled program together with the machine it runs on.
#[derive(Clone, Debug)]
pub struct Program {
    code: Vec<Instruction>,
    /// Source span of each instruction in `code`.
    spans: Vec<Span>,
    registers: RegisterFile,
    memory: Memory,
    /// Data memory as laid out by `compile`, restored by `start`.
    image: Memory,
    breakpoints: Breakpoints,
    /// Used to allow breakpoint to be passed on second attempt.
    paused_at: Option<u32>,
    state: ProgramState,
}

impl Default for Program {
    fn default() -> Self {
        Program::new()
    }
}

impl Program {
    pub fn new() -> Self {
        Program::with_memory_size(DEFAULT_SIZE)
    }

    pub fn with_memory_size(size: usize) -> Self {
        let memory = Memory::new(size);
        Program {
            code: Vec::new(),
            spans: Vec::new(),
            registers: RegisterFile::new(),
            image: memory.clone(),
            memory,
            breakpoints: Breakpoints::new(),
            paused_at: None,
            state: ProgramState::Loading,
        }
    }

    /// Parse and compile assembly source, reporting errors against it.
    pub fn assemble(&mut self, src: &str) -> miette::Result<()> {
        let air = AsmParser::new(src)?.parse()?;
        self.load(&air)
            .map_err(|(err, span)| error::parse_build(span, src, err))
    }

    /// Lay out parser output into code, data and symbols, then get ready to run.
    ///
    /// Replaces anything compiled before.
    pub fn compile(&mut self, air: &Air) -> Result<(), BuildError> {
        self.load(air).map_err(|(err, _)| err)
    }

    fn load(&mut self, air: &Air) -> Result<(), (BuildError, Span)> {
        *self = Program::with_memory_size(self.memory.size());
        let base = self.memory.base();
        let mut section = Section::None;
        let mut data_offset: u32 = 0;

        for line in air.iter() {
            let span = line.span;
            match &line.node {
                Node::Area(area) => {
                    section = match (area.has(AreaAttr::Code), area.has(AreaAttr::Data)) {
                        (true, true) => {
                            let name = area.name.clone();
                            return Err((BuildError::ConflictingArea { name }, span));
                        }
                        (true, false) => Section::Code,
                        (false, true) => {
                            data_offset = align_up(data_offset, 4);
                            Section::Data
                        }
                        (false, false) => {
                            tracing::warn!(
                                "AREA {} is neither CODE nor DATA; its contents are ignored",
                                area.name
                            );
                            Section::None
                        }
                    };
                    tracing::debug!(area = %area.name, section = ?section, "entering area");
                    if let Some(label) = &line.label {
                        tracing::warn!("label `{label}` on an AREA directive is ignored");
                    }
                }
                Node::Instruction(ins) => {
                    if section != Section::Code {
                        tracing::warn!("`{ins}` is outside a CODE area and was discarded");
                        continue;
                    }
                    let offset = self.code.len() as u32;
                    if let Some(label) = &line.label {
                        self.define(label, offset, span)?;
                    }
                    self.code.push(ins.clone());
                    self.spans.push(span);
                }
                Node::Data(def) => {
                    if section != Section::Data {
                        tracing::warn!("data directive outside a DATA area was discarded");
                        continue;
                    }
                    data_offset = align_up(data_offset, def.align());
                    let addr = base.wrapping_add(data_offset);
                    if let Some(label) = &line.label {
                        self.define(label, addr, span)?;
                    }
                    self.memory
                        .store_bytes(addr, &def.to_bytes())
                        .map_err(|err| (BuildError::from(err), span))?;
                    tracing::debug!("placed {} data bytes at 0x{addr:08X}", def.size());
                    data_offset += def.size();
                }
            }
        }

        for (ins, span) in self.code.iter().zip(&self.spans) {
            if let Some(name) = ins.target().and_then(Target::label) {
                if !self.registers.symbols().contains(name) {
                    let name = name.to_owned();
                    return Err((BuildError::UnresolvedSymbol { name }, *span));
                }
            }
        }

        self.breakpoints.insert(Breakpoint {
            offset: self.code.len() as u32,
            is_predefined: true,
        });
        self.image = self.memory.clone();
        self.state = ProgramState::Ready;
        tracing::debug!(
            instructions = self.code.len(),
            symbols = self.registers.symbols().len(),
            "compiled program"
        );
        Ok(())
    }

    fn define(
        &mut self,
        label: &str,
        value: u32,
        span: Span,
    ) -> Result<(), (BuildError, Span)> {
        tracing::debug!("symbol {label} = 0x{value:X}");
        self.registers
            .symbols_mut()
            .insert(label, value)
            .map_err(|err| (err, span))
    }

    /// Zero the registers, restore the data image and put PC at the start.
    pub fn start(&mut self) {
        self.registers.reset();
        self.memory = self.image.clone();
        self.paused_at = None;
        if self.state != ProgramState::Loading {
            self.state = ProgramState::Ready;
        }
    }

    /// Execute one instruction, or report the breakpoint at PC.
    ///
    /// A user breakpoint that paused the previous step is passed; the one after
    /// the last instruction always halts.
    pub fn step(&mut self) -> Result<StepOutcome, ExecError> {
        let Program {
            code,
            registers,
            memory,
            breakpoints,
            paused_at,
            state,
            ..
        } = self;
        registers.clear_changes();
        let pc = registers.pc();

        if let Some(bp) = breakpoints.get(pc) {
            if bp.is_predefined || *paused_at != Some(pc) {
                *paused_at = Some(pc);
                *state = ProgramState::Halted;
                tracing::info!(predefined = bp.is_predefined, "reached breakpoint at {pc}");
                return Ok(StepOutcome::Breakpoint);
            }
        }
        *paused_at = None;

        let Some(ins) = code.get(pc as usize) else {
            *state = ProgramState::Halted;
            return Err(ExecError::PcOutOfRange {
                pc,
                len: code.len(),
            });
        };
        *state = ProgramState::Running;
        // PC is advanced before execution, like the hardware pipeline
        registers.set_pc(pc.wrapping_add(1));
        tracing::trace!("{pc:>4}: {ins}");

        match ins.execute(registers, memory) {
            Ok(StepOutcome::Breakpoint) => {
                *state = ProgramState::Halted;
                tracing::info!("BKPT at {pc}");
                Ok(StepOutcome::Breakpoint)
            }
            Ok(StepOutcome::Continued) => Ok(StepOutcome::Continued),
            Err(err) => {
                *state = ProgramState::Halted;
                Err(err)
            }
        }
    }

    /// Step until a breakpoint is reached.
    pub fn run(&mut self) -> Result<(), ExecError> {
        while self.step()? == StepOutcome::Continued {}
        Ok(())
    }

    /// Like [`Self::run`], but gives up after `max_steps` steps.
    ///
    /// Returns the number of steps taken before the breakpoint, or `None` if
    /// the budget ran out first.
    pub fn run_bounded(&mut self, max_steps: u64) -> Result<Option<u64>, ExecError> {
        for taken in 0..max_steps {
            if self.step()? == StepOutcome::Breakpoint {
                return Ok(Some(taken));
            }
        }
        Ok(None)
    }

    /// Stop for good, as on an explicit quit.
    pub fn halt(&mut self) {
        self.state = ProgramState::Halted;
    }

    pub fn state(&self) -> ProgramState {
        self.state
    }

    /// Offset of the breakpoint that stopped the last step.
    ///
    /// `None` when the step ran an instruction instead, including `BKPT`.
    pub fn breakpoint_hit(&self) -> Option<u32> {
        self.paused_at
    }

    pub fn registers(&self) -> RegisterSnapshot {
        self.registers.snapshot()
    }

    /// Register indices written by the last step. 16 stands for the CPSR.
    pub fn changed_registers(&self) -> &[usize] {
        self.registers.changed()
    }

    /// Disassembly of the instruction at PC.
    pub fn current_instruction(&self) -> Option<String> {
        self.instruction_at(self.registers.pc())
            .map(ToString::to_string)
    }

    pub fn instruction_at(&self, offset: u32) -> Option<&Instruction> {
        self.code.get(offset as usize)
    }

    /// Source span of the instruction at `offset`.
    pub fn span_at(&self, offset: u32) -> Option<Span> {
        self.spans.get(offset as usize).copied()
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        self.registers.symbols()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    /// Returns `false` for an offset past the end of the code or a duplicate.
    pub fn add_breakpoint(&mut self, offset: u32) -> bool {
        if offset as usize > self.code.len() {
            return false;
        }
        self.breakpoints.insert(Breakpoint {
            offset,
            is_predefined: false,
        })
    }

    pub fn remove_breakpoint(&mut self, offset: u32) -> bool {
        self.breakpoints.remove(offset)
    }
}

fn align_up(value: u32, align: u32) -> u32 {
    value.next_multiple_of(align)
}
