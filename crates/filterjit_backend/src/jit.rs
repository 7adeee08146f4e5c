//! Native code generation and the compiled routine.
//!
//! A routine is a plain function pointer with the C ABI:
//!
//! ```text
//! fn(data: *const Span, aux: *const Span, vars: *const Span,
//!    row: i64, out: *mut u8) -> i32
//! ```
//!
//! `data` and `aux` describe the base address tables (a pointer to their
//! entries and the entry count), `vars` describes the variable table. The
//! routine writes its result to `out` and returns 0. A bounds failure
//! returns the number of the failing access instead, with the offset and the
//! region length written to `out`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use cranelift_codegen::Context;
use cranelift_codegen::ir::{AbiParam, InstBuilder, MemFlags, types};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{DataDescription, DataId, FuncId, Linkage, Module, default_libcall_names};
use filterjit_foundation::{Error, Result};
use filterjit_storage::{Region, RowFrame};
use tracing::debug;

use crate::ir::RegClass;
use crate::native::{EntryValues, NativeBody, NativeEmitter};
use crate::program::Program;
use crate::scalar::Scalar;

fn codegen_error(err: impl fmt::Display) -> Error {
    Error::backend(format!("codegen: {err}"))
}

/// A pointer and a length, as the routine reads them.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
struct Span {
    ptr: *const u8,
    len: u64,
}

impl Span {
    fn of(bytes: &[u8]) -> Self {
        Self {
            ptr: bytes.as_ptr(),
            len: bytes.len() as u64,
        }
    }

    fn table(entries: &[Span]) -> Self {
        Self {
            ptr: entries.as_ptr().cast(),
            len: entries.len() as u64,
        }
    }
}

type RoutineFn = unsafe extern "C" fn(*const Span, *const Span, *const Span, i64, *mut u8) -> i32;

/// A [`RowFrame`] laid out for native code.
///
/// Build it once and reuse it for every row of the same storage.
pub struct NativeFrame<'a> {
    data: Vec<Span>,
    aux: Vec<Span>,
    vars: Span,
    _storage: PhantomData<&'a [u8]>,
}

impl<'a> NativeFrame<'a> {
    /// Describes the regions of `frame`.
    #[must_use]
    pub fn new(frame: &RowFrame<'a>) -> Self {
        Self {
            data: frame.data_vectors().iter().map(|v| Span::of(v)).collect(),
            aux: frame.aux_vectors().iter().map(|v| Span::of(v)).collect(),
            vars: Span::of(frame.vars()),
            _storage: PhantomData,
        }
    }
}

impl fmt::Debug for NativeFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFrame")
            .field("columns", &self.data.len())
            .field("aux", &self.aux.len())
            .field("vars", &self.vars.len)
            .finish()
    }
}

/// Owns the code memory of a finalized routine.
struct NativeCode {
    module: Option<JITModule>,
    entry: RoutineFn,
}

// SAFETY: after `finalize_definitions` the code pages are immutable and the
// entry is a plain function pointer. The module is only touched again when
// the code is dropped, which needs exclusive ownership.
unsafe impl Send for NativeCode {}
unsafe impl Sync for NativeCode {}

impl Drop for NativeCode {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // SAFETY: the last reference to the entry point goes away with
            // `self`.
            unsafe { module.free_memory() };
        }
    }
}

/// A compiled routine, callable once per row.
#[derive(Clone)]
pub struct NativeRoutine {
    code: Arc<NativeCode>,
    result: RegClass,
    sites: Arc<[Region]>,
}

impl fmt::Debug for NativeRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRoutine")
            .field("result", &self.result)
            .field("checked_accesses", &self.sites.len())
            .finish_non_exhaustive()
    }
}

impl NativeRoutine {
    /// Register class of the value the routine returns.
    #[must_use]
    pub fn result_class(&self) -> RegClass {
        self.result
    }

    /// Evaluates the routine for `row`.
    ///
    /// # Errors
    /// Returns `OutOfBounds` if the routine addresses memory outside
    /// `frame`.
    pub fn run(&self, frame: &NativeFrame<'_>, row: i64) -> Result<Scalar> {
        let tables = [Span::table(&frame.data), Span::table(&frame.aux), frame.vars];
        let mut out = [0u8; 16];
        // SAFETY: the routine was generated for exactly this signature. Every
        // load is checked against the lengths in `tables`, which describe
        // slices borrowed for the lifetime of `frame`, and it writes at most
        // 16 bytes to `out`.
        let status = unsafe {
            (self.code.entry)(
                &raw const tables[0],
                &raw const tables[1],
                &raw const tables[2],
                row,
                out.as_mut_ptr(),
            )
        };
        let (low, high) = out.split_at(8);
        let word = |bytes: &[u8]| {
            let mut w = [0u8; 8];
            w.copy_from_slice(bytes);
            w
        };
        if status != 0 {
            let region = usize::try_from(status - 1)
                .ok()
                .and_then(|site| self.sites.get(site))
                .ok_or_else(|| Error::backend(format!("routine returned unknown status {status}")))?;
            let offset = i64::from_le_bytes(word(low));
            let len = usize::try_from(u64::from_le_bytes(word(high))).unwrap_or(usize::MAX);
            return Err(Error::out_of_bounds(region.to_string(), offset, len));
        }
        let value = match self.result {
            RegClass::Gp32 => Scalar::I32(i32::from_le_bytes([out[0], out[1], out[2], out[3]])),
            RegClass::Gp64 => Scalar::I64(i64::from_le_bytes(word(low))),
            RegClass::F32 => Scalar::F32(f32::from_le_bytes([out[0], out[1], out[2], out[3]])),
            RegClass::F64 => Scalar::F64(f64::from_le_bytes(word(low))),
            RegClass::V128 => Scalar::I128(i128::from_le_bytes(out)),
        };
        Ok(value)
    }
}

/// A Cranelift module holding one routine under construction.
///
/// # Example
///
/// ```
/// use filterjit_backend::{Emitter, Imm, JitContext, NativeFrame, RegClass, Scalar};
/// use filterjit_storage::RowFrame;
///
/// let mut jit = JitContext::new().unwrap();
/// let mut e = jit.emitter(false);
/// let r = e.new_reg(RegClass::Gp32, "answer");
/// e.mov(r, Imm::Int(42).into()).unwrap();
/// e.ret(r).unwrap();
/// let body = e.finish().unwrap();
/// let (_program, routine) = jit.link(body).unwrap();
///
/// let frame = RowFrame::default();
/// assert_eq!(routine.run(&NativeFrame::new(&frame), 0).unwrap(), Scalar::I32(42));
/// ```
pub struct JitContext {
    module: JITModule,
    ctx: Context,
    fb_ctx: FunctionBuilderContext,
    func_id: FuncId,
    pool_id: DataId,
}

impl fmt::Debug for JitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JitContext").finish_non_exhaustive()
    }
}

impl JitContext {
    /// Sets up a module for the host machine.
    ///
    /// # Errors
    /// Returns `Backend` if the host is not supported.
    pub fn new() -> Result<Self> {
        let mut flags = settings::builder();
        flags.set("opt_level", "speed").map_err(codegen_error)?;
        flags.set("is_pic", "false").map_err(codegen_error)?;
        let isa = cranelift_native::builder()
            .map_err(codegen_error)?
            .finish(settings::Flags::new(flags))
            .map_err(codegen_error)?;
        if isa.pointer_type() != types::I64 {
            return Err(Error::backend("native code needs a 64-bit host"));
        }

        let mut module = JITModule::new(JITBuilder::with_isa(isa, default_libcall_names()));
        let mut ctx = module.make_context();
        let ptr = types::I64;
        ctx.func.signature.params = vec![
            AbiParam::new(ptr),        // data table
            AbiParam::new(ptr),        // aux table
            AbiParam::new(ptr),        // variables
            AbiParam::new(types::I64), // row
            AbiParam::new(ptr),        // out
        ];
        ctx.func.signature.returns = vec![AbiParam::new(types::I32)];

        let func_id = module
            .declare_function("filter_routine", Linkage::Local, &ctx.func.signature)
            .map_err(codegen_error)?;
        let pool_id = module
            .declare_data("constant_pool", Linkage::Local, false, false)
            .map_err(codegen_error)?;
        Ok(Self {
            module,
            ctx,
            fb_ctx: FunctionBuilderContext::new(),
            func_id,
            pool_id,
        })
    }

    /// Starts emitting the routine body.
    pub fn emitter(&mut self, name_registers: bool) -> NativeEmitter<'_> {
        let pool = self
            .module
            .declare_data_in_func(self.pool_id, &mut self.ctx.func);
        let mut builder = FunctionBuilder::new(&mut self.ctx.func, &mut self.fb_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        let params = builder.block_params(entry).to_vec();
        let desc = |b: &mut FunctionBuilder<'_>, at: usize| {
            let ptr = b.ins().load(types::I64, MemFlags::trusted(), params[at], 0);
            let len = b.ins().load(types::I64, MemFlags::trusted(), params[at], 8);
            (ptr, len)
        };
        let (data_entries, data_count) = desc(&mut builder, 0);
        let (aux_entries, aux_count) = desc(&mut builder, 1);
        let (vars, vars_len) = desc(&mut builder, 2);
        let values = EntryValues {
            data_entries,
            data_count,
            aux_entries,
            aux_count,
            vars,
            vars_len,
            row: params[3],
            out: params[4],
        };
        NativeEmitter::new(builder, pool, &values, name_registers)
    }

    /// Compiles and links a finished body.
    ///
    /// Returns the reference program recorded alongside it and the native
    /// routine.
    ///
    /// # Errors
    /// Returns `Backend` if Cranelift rejects the function.
    pub fn link(mut self, body: NativeBody) -> Result<(Program, NativeRoutine)> {
        let NativeBody { program, sites } = body;

        let mut pool = DataDescription::new();
        let mut bytes = program.constant_pool().to_vec();
        if bytes.is_empty() {
            bytes.push(0);
        }
        pool.define(bytes.into_boxed_slice());
        pool.set_align(16);
        self.module
            .define_data(self.pool_id, &pool)
            .map_err(codegen_error)?;

        self.module
            .define_function(self.func_id, &mut self.ctx)
            .map_err(codegen_error)?;
        self.module.finalize_definitions().map_err(codegen_error)?;

        let raw = self.module.get_finalized_function(self.func_id);
        // SAFETY: the function was declared with exactly this signature. The
        // module moves into `NativeCode`, which keeps the code alive for as
        // long as the pointer can be called.
        let entry = unsafe { std::mem::transmute::<*const u8, RoutineFn>(raw) };
        debug!(
            result = program.result_class().name(),
            checked_accesses = sites.len(),
            "linked native routine"
        );

        let routine = NativeRoutine {
            code: Arc::new(NativeCode {
                module: Some(self.module),
                entry,
            }),
            result: program.result_class(),
            sites: sites.into(),
        };
        Ok((program, routine))
    }
}
