use armsim::{
    condition::Flags,
    memory::DATA_BASE,
    symbol::Register,
    BuildError, ExecError, MemoryError, Program, ProgramState, StepOutcome,
};
use pretty_assertions::assert_eq;

fn assemble(src: &str) -> Program {
    let mut program = Program::new();
    program.assemble(src).unwrap();
    program
}

fn reg(program: &Program, reg: Register) -> u32 {
    program.registers().regs[reg.index()]
}

fn step_n(program: &mut Program, n: usize) {
    for _ in 0..n {
        assert_eq!(program.step(), Ok(StepOutcome::Continued));
    }
}

#[test]
fn branch_to_self_loops_in_place() {
    let mut program = assemble(
        "
        AREA Program, CODE
        MOV R0, #1
        MOV R1, #2
        ADD R2, R0, R1
        B end
end     B end
",
    );
    let end = program.symbol_table().get("end").unwrap();
    assert_eq!(end, 4);

    step_n(&mut program, 4);
    assert_eq!(reg(&program, Register::R2), 3);
    assert_eq!(reg(&program, Register::PC), end);

    let before = program.registers();
    step_n(&mut program, 1);
    assert_eq!(program.registers(), before);
}

#[test]
fn shifter_chains_through_data_processing() {
    let src = |value: u32| {
        format!(
            "
        AREA Program, CODE
        MOV R1, #{value:#X}
        AND R2, R1, #0x1
        MOV R0, R2, LSL #2
"
        )
    };

    let mut program = assemble(&src(0xAC));
    program.run().unwrap();
    assert_eq!(reg(&program, Register::R2), 0);
    assert_eq!(reg(&program, Register::R0), 0);

    let mut program = assemble(&src(0xAD));
    program.run().unwrap();
    assert_eq!(reg(&program, Register::R2), 1);
    assert_eq!(reg(&program, Register::R0), 4);
}

#[test]
fn data_area_lays_out_string() {
    let program = assemble(
        r#"
        AREA Strings, DATA, READWRITE
msg     DCB "hi", 0
next    DCB 7

        AREA Program, CODE, READONLY
        LDR R0, =msg
"#,
    );
    let msg = program.symbol_table().get("msg").unwrap();
    assert_eq!(msg, DATA_BASE);
    assert_eq!(program.symbol_table().get("next"), Some(DATA_BASE + 3));
    assert_eq!(program.memory().range_to_bytes(msg, 4), b"hi\0\x07".to_vec());
}

#[test]
fn add_overflow_flags() {
    let mut program = assemble(
        "
        AREA Program, CODE
        LDR R0, =0x7FFFFFFF
        ADDS R1, R0, #1
",
    );
    program.run().unwrap();
    assert_eq!(reg(&program, Register::R1), 0x8000_0000);
    assert_eq!(
        program.registers().flags(),
        Flags {
            n: true,
            z: false,
            c: false,
            v: true
        }
    );
}

#[test]
fn compare_borrow_clears_carry() {
    let mut program = assemble(
        "
        AREA Program, CODE
        MOV R0, #5
        CMP R0, #10
        MOVCC R1, #1
        MOVMI R2, #1
        MOVEQ R3, #1
",
    );
    program.run().unwrap();
    let flags = program.registers().flags();
    assert!(!flags.c);
    assert!(flags.n);
    assert!(!flags.z);
    assert_eq!(reg(&program, Register::R1), 1);
    assert_eq!(reg(&program, Register::R2), 1);
    assert_eq!(reg(&program, Register::R3), 0);
}

#[test]
fn skipped_instruction_cannot_fault() {
    let mut program = assemble(
        "
        AREA Program, CODE
        MOV R0, #1
        CMP R0, #0
        LDREQ R1, [R0]
        MOV R2, #2
",
    );
    program.run().unwrap();
    assert_eq!(reg(&program, Register::R1), 0);
    assert_eq!(reg(&program, Register::R2), 2);
}

#[test]
fn counts_down_with_conditional_branch() {
    let mut program = assemble(include_str!("files/sum.s"));
    assert_eq!(program.run_bounded(1000), Ok(Some(32)));
    assert_eq!(reg(&program, Register::R0), 55);
    assert_eq!(program.state(), ProgramState::Halted);
}

#[test]
fn subroutine_call_and_return() {
    let mut program = assemble(
        "
        AREA Program, CODE
        MOV R0, #3
        BL double
        B done
double  ADD R0, R0, R0
        BX LR
done    MOV R1, R0
",
    );
    program.run().unwrap();
    assert_eq!(reg(&program, Register::R1), 6);
    assert_eq!(reg(&program, Register::LR), 2);
}

#[test]
fn stores_and_loads_through_write_back() {
    let mut program = assemble(
        "
        AREA Buffer, DATA
buf     SPACE 16

        AREA Program, CODE
        LDR R0, =buf
        MOV R1, #0x11
        STR R1, [R0], #4
        MOV R1, #0x22
        STRB R1, [R0, #1]!
        LDR R2, =buf
        LDR R3, [R2]
        LDRB R4, [R2, #5]
",
    );
    program.run().unwrap();
    assert_eq!(reg(&program, Register::R0), DATA_BASE + 5);
    assert_eq!(reg(&program, Register::R3), 0x11);
    assert_eq!(reg(&program, Register::R4), 0x22);
}

#[test]
fn user_breakpoint_is_passed_on_resume() {
    let mut program = assemble(include_str!("files/loop.s"));
    assert!(program.add_breakpoint(2));
    assert!(!program.add_breakpoint(2));
    assert!(!program.add_breakpoint(99));

    step_n(&mut program, 2);
    assert_eq!(program.step(), Ok(StepOutcome::Breakpoint));
    assert_eq!(program.state(), ProgramState::Halted);
    assert_eq!(program.step(), Ok(StepOutcome::Continued));
    assert_eq!(reg(&program, Register::R2), 3);
}

#[test]
fn end_of_code_always_halts() {
    let mut program = assemble("        AREA Program, CODE\n        MOV R0, #1\n");
    assert_eq!(program.step(), Ok(StepOutcome::Continued));
    assert_eq!(program.step(), Ok(StepOutcome::Breakpoint));
    assert_eq!(program.step(), Ok(StepOutcome::Breakpoint));
    assert!(!program.remove_breakpoint(1));
}

#[test]
fn final_bkpt_is_told_apart_from_the_end() {
    let mut program = assemble("        AREA Program, CODE\n        MOV R0, #1\n        BKPT\n");
    program.run().unwrap();
    assert_eq!(reg(&program, Register::PC), 2);
    assert_eq!(program.breakpoint_hit(), None);

    assert_eq!(program.step(), Ok(StepOutcome::Breakpoint));
    assert_eq!(program.breakpoint_hit(), Some(2));
}

#[test]
fn restart_restores_data() {
    let mut program = assemble(
        "
        AREA Data, DATA
value   DCD 1

        AREA Program, CODE
        LDR R0, =value
        MOV R1, #9
        STR R1, [R0]
",
    );
    let value = program.symbol_table().get("value").unwrap();
    program.run().unwrap();
    assert_eq!(program.memory().load_word(value), Ok(9));

    program.start();
    assert_eq!(program.state(), ProgramState::Ready);
    assert_eq!(program.memory().load_word(value), Ok(1));
    assert_eq!(reg(&program, Register::R1), 0);
}

#[test]
fn reports_runtime_memory_errors() {
    let mut program = assemble(
        "
        AREA Program, CODE
        LDR R0, =0xA1000002
        LDR R1, [R0]
",
    );
    assert_eq!(
        program.run(),
        Err(ExecError::Memory(MemoryError::Misaligned {
            addr: 0xA100_0002,
            width: armsim::error::Width::Word,
        }))
    );
    assert_eq!(program.state(), ProgramState::Halted);
}

#[test]
fn reports_build_errors() {
    let build = |src: &str| {
        let air = armsim::AsmParser::new(src).unwrap().parse().unwrap();
        Program::new().compile(&air)
    };
    assert_eq!(
        build("        AREA Mixed, CODE, DATA\n"),
        Err(BuildError::ConflictingArea {
            name: "Mixed".into()
        })
    );
    assert_eq!(
        build("        AREA P, CODE\nx       MOV R0, #1\nx       MOV R0, #2\n"),
        Err(BuildError::DuplicateSymbol { name: "x".into() })
    );
    assert_eq!(
        build("        AREA P, CODE\n        B nowhere\n"),
        Err(BuildError::UnresolvedSymbol {
            name: "nowhere".into()
        })
    );
}

#[test]
fn lines_outside_areas_are_discarded() {
    let program = assemble("        MOV R0, #1\n        AREA P, CODE\n        MOV R1, #2\n");
    assert_eq!(program.code().len(), 1);
    assert_eq!(
        program.current_instruction().as_deref(),
        Some("MOV R1, #2")
    );
}
