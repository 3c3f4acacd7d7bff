// This module drives compilation of an expression DAG. The tree owns the node list in
// topological order, the parameter list and the register state; compilation runs three
// passes over it: reserve the calling-convention registers of every parameter, emit each
// multiply-referenced subexpression once into a stable location, then emit the root.
// Nodes and parameters stay behind capability traits; the tree never inspects their kind.

//! Expression-tree compilation driver.

use std::fmt;

use bumpalo::{collections::Vec as BumpVec, Bump};

use crate::core::error::CompileResult;
use crate::core::register_file::RegisterFile;
use crate::x64::encoder::X64Encoder;
use crate::x64::regs::{Gp, Xmm};

/// Capability an expression node exposes to the compiler.
///
/// Nodes live in the caller's arena and are shared references, so cached
/// state is mutated through interior mutability.
pub trait Node {
    /// Number of consumers this node has in the DAG; the return node has
    /// none.
    fn parent_count(&self) -> u32;

    /// Whether the value has already been materialized into a stable
    /// location.
    fn is_cached(&self) -> bool;

    /// Emit the computation once and bind the result to a stable location
    /// (a register or a temporary slot), marking the node cached.
    fn code_gen_cache(&self, tree: &mut ExpressionTree<'_>) -> CompileResult<()>;

    /// Preparation pass over the subtree before root emission.
    fn label_subtree(&self, is_root: bool);

    /// Emit the final expression producing the function result.
    fn compile_as_root(&self, tree: &mut ExpressionTree<'_>) -> CompileResult<()>;

    /// Write a one-line description for the debug listing.
    fn print(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}

/// Capability a function parameter exposes to the compiler.
pub trait Parameter {
    /// Take the calling-convention register for this parameter's position
    /// out of the pool.
    fn reserve_register(&self, registers: &mut RegisterFile);

    /// Write a one-line description for the debug listing.
    fn print_parameter(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}

/// Compilation progresses through these states in order; passes assert on
/// their predecessor so out-of-order invocation fails fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompilePass {
    Initial,
    Prologue,
    Pass1,
    Pass2,
    Pass3,
    Epilogue,
    Final,
}

/// An expression DAG staged for compilation.
///
/// Holds non-owning references to nodes and parameters allocated in the
/// caller's arena; the node list must be populated children before parents.
pub struct ExpressionTree<'a> {
    allocator: &'a Bump,
    code: &'a mut X64Encoder,
    parameter_registers: RegisterFile,
    base_pointer: Gp,
    stack_pointer: Gp,
    temporary_count: u32,
    topological_sort: BumpVec<'a, &'a dyn Node>,
    parameters: BumpVec<'a, &'a dyn Parameter>,
    rxx_registers: BumpVec<'a, u8>,
    xmm_registers: BumpVec<'a, u8>,
    pass: CompilePass,
}

impl<'a> ExpressionTree<'a> {
    pub fn new(allocator: &'a Bump, code: &'a mut X64Encoder) -> ExpressionTree<'a> {
        let parameter_registers = RegisterFile::new(code.rxx_count(), code.xmm_count());
        ExpressionTree {
            allocator,
            code,
            parameter_registers,
            base_pointer: Gp::RBP,
            stack_pointer: Gp::RSP,
            temporary_count: 0,
            topological_sort: BumpVec::new_in(allocator),
            parameters: BumpVec::new_in(allocator),
            rxx_registers: BumpVec::new_in(allocator),
            xmm_registers: BumpVec::new_in(allocator),
            pass: CompilePass::Initial,
        }
    }

    pub fn allocator(&self) -> &'a Bump {
        self.allocator
    }

    /// Append a node to the topological sort and return its position.
    /// Children must be added before their parents; the compiler does not
    /// re-sort.
    pub fn add_node(&mut self, node: &'a dyn Node) -> usize {
        debug_assert!(
            self.pass == CompilePass::Initial,
            "nodes must be added before compilation"
        );
        self.topological_sort.push(node);
        self.topological_sort.len() - 1
    }

    /// Append a parameter and return its position.
    pub fn add_parameter(&mut self, parameter: &'a dyn Parameter) -> usize {
        debug_assert!(
            self.pass == CompilePass::Initial,
            "parameters must be added before compilation"
        );
        self.parameters.push(parameter);
        self.parameters.len() - 1
    }

    pub fn parameter_registers(&self) -> &RegisterFile {
        &self.parameter_registers
    }

    pub fn code_generator(&mut self) -> &mut X64Encoder {
        self.code
    }

    pub fn base_pointer(&self) -> Gp {
        self.base_pointer
    }

    pub fn set_base_pointer(&mut self, register: Gp) {
        assert!(
            register != self.stack_pointer,
            "base pointer must stay distinct from the stack pointer"
        );
        self.base_pointer = register;
    }

    /// Reserve a fresh 8-byte temporary slot and return its offset from the
    /// base pointer. Offsets are monotonic; slots are not reused.
    pub fn allocate_temporary(&mut self) -> i32 {
        let offset = self.temporary_count * 8;
        self.temporary_count += 1;
        offset as i32
    }

    /// Release a temporary slot. Reuse is not implemented; callers must not
    /// rely on a released slot being handed out again.
    pub fn release_temporary(&mut self, _offset: i32) {}

    /// Number of temporary slots handed out so far.
    pub fn temporary_count(&self) -> u32 {
        self.temporary_count
    }

    /// Take a free general-purpose register from the pool populated by
    /// pass 1.
    pub fn acquire_rxx(&mut self) -> Option<Gp> {
        self.rxx_registers.pop().map(Gp::from_id)
    }

    pub fn release_rxx(&mut self, register: Gp) {
        debug_assert!(
            !self.rxx_registers.contains(&register.id()),
            "{register} released twice"
        );
        self.rxx_registers.push(register.id());
    }

    /// Take a free vector register from the pool populated by pass 1.
    pub fn acquire_xmm(&mut self) -> Option<Xmm> {
        self.xmm_registers.pop().map(Xmm::from_id)
    }

    pub fn release_xmm(&mut self, register: Xmm) {
        debug_assert!(
            !self.xmm_registers.contains(&register.id()),
            "{register} released twice"
        );
        self.xmm_registers.push(register.id());
    }

    /// Compile the whole DAG: prologue, the three passes, epilogue.
    pub fn compile(&mut self) -> CompileResult<()> {
        assert!(
            self.pass == CompilePass::Initial,
            "compile must start from the initial state"
        );

        self.prologue()?;
        self.pass1();
        self.pass2()?;
        log::trace!("after pass 2:\n{}", self.listing());
        self.pass3()?;
        self.epilogue();

        self.pass = CompilePass::Final;
        Ok(())
    }

    /// Link the frame register to the stack register so base-relative
    /// addressing works before the real prolog is attached. Frame setup
    /// proper belongs to `FunctionSpecification`.
    fn prologue(&mut self) -> CompileResult<()> {
        self.pass = CompilePass::Prologue;
        log::debug!(
            "prologue: mov {}, {}",
            self.base_pointer,
            self.stack_pointer
        );
        Ok(self.code.mov_reg_reg(self.base_pointer, self.stack_pointer)?)
    }

    /// Pass 1: each parameter reserves its calling-convention register,
    /// then every register still in the pool, other than the base and
    /// stack pointers, enters the free list.
    fn pass1(&mut self) {
        assert!(
            self.pass == CompilePass::Prologue,
            "pass 1 requires the prologue to have run"
        );
        self.pass = CompilePass::Pass1;
        log::debug!("pass 1: reserving {} parameter registers", self.parameters.len());

        for i in 0..self.parameters.len() {
            let parameter = self.parameters[i];
            parameter.reserve_register(&mut self.parameter_registers);
        }

        let reserved = self.parameter_registers.reserved_rxx();
        for id in 0..self.parameter_registers.rxx_count() as u8 {
            if reserved & (1 << id) != 0
                && id != self.base_pointer.id()
                && id != self.stack_pointer.id()
            {
                self.rxx_registers.push(id);
            }
        }

        // TODO: subtract XMM parameter reservations once the float
        // calling-convention mask is wired through.
        for id in 0..16 {
            self.xmm_registers.push(id);
        }
    }

    /// Pass 2: materialize every node with more than one consumer into a
    /// stable location, exactly once. Children precede parents in the
    /// sort, so each shared value exists before anything consumes it.
    fn pass2(&mut self) -> CompileResult<()> {
        assert!(
            self.pass == CompilePass::Pass1,
            "pass 2 requires pass 1 register state"
        );
        self.pass = CompilePass::Pass2;

        for i in 0..self.topological_sort.len() {
            let node = self.topological_sort[i];

            if node.parent_count() > 1 && !node.is_cached() {
                log::trace!("pass 2: caching node {i}");
                node.code_gen_cache(self)?;
            }
        }
        Ok(())
    }

    /// Pass 3: emit the return node.
    fn pass3(&mut self) -> CompileResult<()> {
        assert!(
            self.pass == CompilePass::Pass2,
            "pass 3 requires pass 2 to have materialized shared values"
        );
        self.pass = CompilePass::Pass3;

        let root = *self
            .topological_sort
            .last()
            .expect("expression tree has no return node");
        debug_assert!(root.parent_count() == 0, "return node must have no parents");

        root.label_subtree(true);
        root.compile_as_root(self)
    }

    /// Frame teardown belongs to `FunctionSpecification`; nothing is
    /// emitted here.
    fn epilogue(&mut self) {
        self.pass = CompilePass::Epilogue;
        log::debug!("epilogue");
    }

    /// Deterministic debug listing: parameters, nodes, then the state of
    /// every architectural general-purpose register.
    pub fn listing(&self) -> TreeListing<'_, 'a> {
        TreeListing { tree: self }
    }
}

/// Borrowing `Display` adapter for [`ExpressionTree::listing`].
pub struct TreeListing<'t, 'a> {
    tree: &'t ExpressionTree<'a>,
}

impl fmt::Display for TreeListing<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parameters:")?;
        for parameter in self.tree.parameters.iter() {
            parameter.print_parameter(f)?;
            writeln!(f)?;
        }
        writeln!(f)?;

        writeln!(f, "Topological sort:")?;
        for node in self.tree.topological_sort.iter() {
            node.print(f)?;
            writeln!(f)?;
        }
        writeln!(f)?;

        writeln!(f, "RXX Registers:")?;
        let mut free = 0u32;
        for &id in self.tree.rxx_registers.iter() {
            free |= 1 << id;
        }
        for id in 0..16u8 {
            let state = if free & (1 << id) != 0 { "free" } else { "in use" };
            writeln!(f, "{} {state}", Gp::from_id(id))?;
        }
        Ok(())
    }
}
