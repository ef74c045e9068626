use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    Callback, Command, Error, Matcher, Operation, Parameter, Result, Specification, State,
    StateGraph, StateId, Transition, DEFAULT_NAMESPACE, MIN_FRAME,
};

/// Compiled output handed to the emitter: the state graph, the callback
/// table, the frame buffer size, and the namespace.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Program {
    pub(crate) graph: StateGraph,
    pub(crate) callbacks: Vec<Callback>,
    pub(crate) buf_size: usize,
    pub(crate) namespace: String,
}

impl Program {
    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn callbacks(&self) -> &[Callback] {
        self.callbacks.as_slice()
    }

    pub fn buf_size(&self) -> usize {
        self.buf_size
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_str()
    }
}

/// Compiles a slave specification into the prefix-merged state graph.
///
/// All diagnostics are fatal; the first one aborts the compilation and no
/// partial output survives.
pub fn compile(spec: &Specification) -> Result<Program> {
    Compiler::new(spec)?.run()
}

struct Compiler<'a> {
    spec: &'a Specification,
    callbacks: BTreeMap<&'a str, &'a [Parameter]>,
    graph: StateGraph,
}

impl<'a> Compiler<'a> {
    /// Validates the callback table and prepares the name lookup.
    fn new(spec: &'a Specification) -> Result<Self> {
        if spec.callbacks().is_empty() {
            return Err(Error::missing_callbacks());
        }

        let mut callbacks = BTreeMap::new();

        for callback in spec.callbacks() {
            if !is_valid_identifier(callback.name()) {
                return Err(Error::invalid_callback_name(callback.name()));
            }

            callbacks.insert(callback.name(), callback.params());
        }

        Ok(Self {
            spec,
            callbacks,
            graph: StateGraph::new(),
        })
    }

    fn run(mut self) -> Result<Program> {
        let root = self.graph.alloc("DEVICE_ADDRESS", 0);

        for device in self.spec.devices() {
            let address = device.parse_address()?;
            log::debug!("compiling device {address} ({} commands)", device.commands().len());

            let device_matcher =
                Matcher::u8_exact(address as i64)?.with_alias(format!("DEVICE_{address}"));

            // reuse the device state when the address is already attached
            let device_state = match self.graph.find_transition(root, &device_matcher) {
                Some((next, _)) => next,
                None => {
                    let state = self.graph.alloc(&format!("DEVICE_{address}"), 1);
                    self.graph
                        .add_transition(root, Transition::new(device_matcher.clone(), state));
                    state
                }
            };

            for command in device.commands() {
                self.process_sequence(&device_matcher, device_state, command)?;
            }
        }

        let buf_size = self.buffer_size();
        let callbacks = self.spec.callbacks().to_vec();
        let namespace = self
            .spec
            .namespace()
            .unwrap_or(DEFAULT_NAMESPACE)
            .to_string();

        Ok(Program {
            graph: self.graph,
            callbacks,
            buf_size,
            namespace,
        })
    }

    /// Extends the trie with one command, merging shared prefixes and
    /// terminating in a CRC-wait state plus an operation state.
    fn process_sequence(
        &mut self,
        device_matcher: &Matcher,
        device_state: StateId,
        command: &Command,
    ) -> Result<()> {
        let callback = command.callback();
        let proto = *self
            .callbacks
            .get(callback)
            .ok_or_else(|| Error::unknown_callback(callback))?;

        // capture chain: device address, function code, then every field
        let mut chain = Vec::with_capacity(command.fields().len() + 2);
        chain.push(device_matcher.clone());
        chain.push(command.function().matcher());
        chain.extend_from_slice(command.fields());

        for matcher in chain.iter().skip(1) {
            matcher.validate()?;
        }

        let mut pos = 1usize;
        for matcher in chain.iter_mut().skip(1) {
            pos += matcher.size();
            matcher.set_pos(pos);
        }

        let mut state = device_state;
        let last = chain.len() - 1;

        for index in 1..=last {
            let matcher = &chain[index];
            let is_last = index == last;

            match self.graph.find_transition(state, matcher) {
                Some((next, set_crc)) => {
                    // a shared full path, or an existing command ending
                    // strictly inside this one, leaves no unique terminal
                    if is_last || set_crc {
                        return Err(Error::duplicate_path(callback));
                    }

                    state = next;
                }
                None if is_last => {
                    let crc_state = self.graph.alloc(
                        &format!(
                            "{}__{}__CRC",
                            self.graph[state].name(),
                            callback.to_uppercase()
                        ),
                        self.graph[state].pos() + matcher.size(),
                    );
                    self.graph
                        .add_transition(state, Transition::into_crc(matcher.clone(), crc_state));

                    let rdy_state = self.graph.alloc(
                        &format!("RDY_TO_CALL__{}", callback.to_uppercase()),
                        self.graph[crc_state].pos() + Matcher::crc().size(),
                    );
                    self.graph
                        .add_transition(crc_state, Transition::new(Matcher::crc(), rdy_state));

                    let op = bind_operation(callback, proto, &chain)?;
                    self.graph[rdy_state].op = Some(op);
                }
                None => {
                    let suffix = match matcher.alias() {
                        Some(alias) => alias.to_string(),
                        None => (self.graph[state].transitions().len() + 1).to_string(),
                    };
                    let next = self.graph.alloc(
                        &format!("{}_{}", self.graph[state].name(), suffix),
                        self.graph[state].pos() + matcher.size(),
                    );
                    self.graph
                        .add_transition(state, Transition::new(matcher.clone(), next));
                    state = next;
                }
            }
        }

        Ok(())
    }

    /// Frame buffer size: the configured reservation or the largest command
    /// frame, whichever is bigger.
    fn buffer_size(&self) -> usize {
        let needed = self
            .spec
            .devices()
            .iter()
            .flat_map(|device| device.commands())
            .map(Command::frame_size)
            .max()
            .unwrap_or(MIN_FRAME);

        needed.max(self.spec.buffer_size().unwrap_or(0))
    }
}

/// Binds callback parameters to frame positions, walking the prototype and
/// the capture chain back to front.
///
/// Each parameter consumes the rearmost unbound chain element; its offset is
/// the bytes before that element, plus the widening residual when the
/// parameter is narrower than the field.
fn bind_operation(callback: &str, proto: &[Parameter], chain: &[Matcher]) -> Result<Operation> {
    let mut remaining = chain.to_vec();
    let mut args = Vec::with_capacity(proto.len());
    let nargs = proto.len();

    for (back, param) in proto.iter().rev().enumerate() {
        let label = match param.name() {
            Some(name) => format!("'{name}' of type {}", param.ty().ctype()),
            None => format!(
                "argument at position {} of type {}",
                nargs - back,
                param.ty().ctype()
            ),
        };

        let field = remaining
            .pop()
            .ok_or_else(|| Error::unfittable_argument(callback, &label))?;

        if !field.fits(param.ty()) {
            return Err(Error::unfittable_argument(callback, &label));
        }

        let preceding: usize = remaining.iter().map(Matcher::size).sum();

        // a widening parameter would read before the field's first byte
        if preceding + field.size() < param.ty().size() {
            return Err(Error::unfittable_argument(callback, &label));
        }

        args.push(crate::Argument {
            offset: preceding + field.size() - param.ty().size(),
            size: param.ty().size(),
        });
    }

    args.reverse();

    Ok(Operation {
        callback: callback.to_string(),
        args,
    })
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Convenience lookups over the compiled graph used by tests and tooling.
impl Program {
    /// Finds a state by name.
    pub fn state(&self, name: &str) -> Option<&State> {
        self.graph.iter().find(|state| state.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, FunctionCode, Integral};

    fn leds_spec() -> Specification {
        let mut spec = Specification::new();
        spec.add_callback(
            "on_get_leds_status",
            vec![
                Parameter::named(Integral::U8, "from"),
                Parameter::named(Integral::U8, "qty"),
            ],
        );
        spec.add_device(
            "0x1A",
            vec![Command::new(
                FunctionCode::ReadCoils,
                vec![
                    Matcher::u16_range(0, 11).unwrap().with_alias("from"),
                    Matcher::u16_range(1, 11).unwrap().with_alias("qty"),
                ],
                "on_get_leds_status",
            )],
        );
        spec
    }

    #[test]
    fn test_single_command_states() -> Result<()> {
        let program = compile(&leds_spec())?;
        let names: Vec<&str> = program.graph().iter().map(State::name).collect();

        assert_eq!(
            names,
            vec![
                "DEVICE_ADDRESS",
                "DEVICE_26",
                "DEVICE_26_READ_COILS",
                "DEVICE_26_READ_COILS_from",
                "DEVICE_26_READ_COILS_from__ON_GET_LEDS_STATUS__CRC",
                "RDY_TO_CALL__ON_GET_LEDS_STATUS",
            ]
        );

        // positions count the bytes consumed to reach each state
        assert_eq!(program.state("DEVICE_ADDRESS").unwrap().pos(), 0);
        assert_eq!(program.state("DEVICE_26").unwrap().pos(), 1);
        assert_eq!(program.state("DEVICE_26_READ_COILS").unwrap().pos(), 2);
        assert_eq!(program.state("DEVICE_26_READ_COILS_from").unwrap().pos(), 4);
        assert_eq!(
            program
                .state("DEVICE_26_READ_COILS_from__ON_GET_LEDS_STATUS__CRC")
                .unwrap()
                .pos(),
            6
        );

        Ok(())
    }

    #[test]
    fn test_argument_binding_offsets() -> Result<()> {
        let program = compile(&leds_spec())?;
        let terminal = program.state("RDY_TO_CALL__ON_GET_LEDS_STATUS").unwrap();
        let op = terminal.operation().unwrap();

        assert_eq!(op.callback(), "on_get_leds_status");
        // u16 fields at bytes 2-3 and 4-5, widened into u8 parameters
        let offsets: Vec<(usize, usize)> =
            op.args().iter().map(|a| (a.offset(), a.size())).collect();
        assert_eq!(offsets, vec![(3, 1), (5, 1)]);

        Ok(())
    }

    #[test]
    fn test_prefix_merging() -> Result<()> {
        let mut spec = Specification::new();
        spec.add_callback("on_low", vec![]);
        spec.add_callback("on_high", vec![]);

        let shared_from = Matcher::u16_exact(0)?.with_alias("from");
        spec.add_device(
            "37",
            vec![
                Command::new(
                    FunctionCode::WriteMultipleCoils,
                    vec![shared_from.clone(), Matcher::u16_range(1, 8)?.with_alias("qty")],
                    "on_low",
                ),
                Command::new(
                    FunctionCode::WriteMultipleCoils,
                    vec![shared_from, Matcher::u16_range(9, 12)?.with_alias("qty")],
                    "on_high",
                ),
            ],
        );

        let program = compile(&spec)?;

        // shared prefix (device, fn code, from) appears once; the commands
        // diverge only at the qty field
        let shared = program.state("DEVICE_37_WRITE_MULTIPLE_COILS_from").unwrap();
        assert_eq!(shared.transitions().len(), 2);
        assert!(shared.transitions().iter().all(Transition::set_crc));

        let fn_states: Vec<&State> = program
            .graph()
            .iter()
            .filter(|s| s.name().starts_with("DEVICE_37_WRITE_MULTIPLE_COILS"))
            .collect();
        // fn state, from state, and the two CRC-wait states
        assert_eq!(fn_states.len(), 4);

        Ok(())
    }

    #[test]
    fn test_state_names_unique() -> Result<()> {
        let mut spec = Specification::new();
        spec.add_callback("on_beep", vec![]);
        spec.add_device(
            "1",
            vec![
                Command::new(
                    FunctionCode::WriteSingleRegister,
                    vec![Matcher::u16_exact(1)?, Matcher::u16_exact(0)?],
                    "on_beep",
                ),
                Command::new(
                    FunctionCode::WriteSingleRegister,
                    vec![Matcher::u16_exact(2)?, Matcher::u16_exact(0)?],
                    "on_beep",
                ),
            ],
        );

        let program = compile(&spec)?;

        let mut names: Vec<&str> = program.graph().iter().map(State::name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);

        // the second terminal for the same callback picked up a suffix
        assert!(program.state("RDY_TO_CALL__ON_BEEP").is_some());
        assert!(program.state("RDY_TO_CALL__ON_BEEP_1").is_some());

        Ok(())
    }

    #[test]
    fn test_device_reuse() -> Result<()> {
        let mut spec = Specification::new();
        spec.add_callback("on_a", vec![]);
        spec.add_callback("on_b", vec![]);
        spec.add_device(
            "device@37",
            vec![Command::new(FunctionCode::ReadCoils, vec![], "on_a")],
        );
        spec.add_device(
            "0x25",
            vec![Command::new(FunctionCode::ReadDiscreteInputs, vec![], "on_b")],
        );

        let program = compile(&spec)?;

        // both declarations target address 37; one device state results,
        // carrying a transition per command
        let devices: Vec<&State> = program
            .graph()
            .iter()
            .filter(|s| s.name() == "DEVICE_37")
            .collect();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].transitions().len(), 2);

        let root = program.state("DEVICE_ADDRESS").unwrap();
        assert_eq!(root.transitions().len(), 1);

        Ok(())
    }

    #[test]
    fn test_unknown_callback() {
        let mut spec = Specification::new();
        spec.add_callback("on_known", vec![]);
        spec.add_device(
            "1",
            vec![Command::new(FunctionCode::ReadCoils, vec![], "on_missing")],
        );

        let err = compile(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCallback);
        assert!(err.message().contains("on_missing"));
    }

    #[test]
    fn test_missing_callbacks() {
        let err = compile(&Specification::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCallbacks);
    }

    #[test]
    fn test_invalid_callback_name() {
        let mut spec = Specification::new();
        spec.add_callback("1bad name", vec![]);

        let err = compile(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCallbackName);
    }

    #[test]
    fn test_duplicate_path() -> Result<()> {
        let mut spec = Specification::new();
        spec.add_callback("on_a", vec![]);
        spec.add_callback("on_b", vec![]);
        spec.add_device(
            "1",
            vec![
                Command::new(
                    FunctionCode::ReadCoils,
                    vec![Matcher::u16_exact(0)?],
                    "on_a",
                ),
                Command::new(
                    FunctionCode::ReadCoils,
                    vec![Matcher::u16_exact(0)?],
                    "on_b",
                ),
            ],
        );

        let err = compile(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicatePath);
        assert!(err.message().contains("on_b"));

        Ok(())
    }

    #[test]
    fn test_path_ending_inside_longer_command() -> Result<()> {
        let mut spec = Specification::new();
        spec.add_callback("on_short", vec![]);
        spec.add_callback("on_long", vec![]);
        spec.add_device(
            "1",
            vec![
                Command::new(
                    FunctionCode::ReadCoils,
                    vec![Matcher::u16_exact(0)?],
                    "on_short",
                ),
                Command::new(
                    FunctionCode::ReadCoils,
                    vec![Matcher::u16_exact(0)?, Matcher::u16_exact(1)?],
                    "on_long",
                ),
            ],
        );

        let err = compile(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicatePath);

        Ok(())
    }

    #[test]
    fn test_overlapping_ranges_allowed() -> Result<()> {
        let mut spec = Specification::new();
        spec.add_callback("on_a", vec![]);
        spec.add_callback("on_b", vec![]);
        spec.add_device(
            "1",
            vec![
                Command::new(
                    FunctionCode::ReadCoils,
                    vec![Matcher::u16_range(0, 8)?],
                    "on_a",
                ),
                Command::new(
                    FunctionCode::ReadCoils,
                    vec![Matcher::u16_range(5, 12)?],
                    "on_b",
                ),
            ],
        );

        // overlap compiles; runtime picks the first match in declaration order
        let program = compile(&spec)?;
        let fn_state = program.state("DEVICE_1_READ_COILS").unwrap();
        assert_eq!(fn_state.transitions().len(), 2);

        Ok(())
    }

    #[test]
    fn test_unfittable_argument() -> Result<()> {
        let mut spec = Specification::new();
        spec.add_callback("on_narrow", vec![Parameter::named(Integral::U8, "qty")]);
        spec.add_device(
            "1",
            vec![Command::new(
                FunctionCode::ReadCoils,
                vec![Matcher::u16_range(0, 0x200)?.with_alias("qty")],
                "on_narrow",
            )],
        );

        let err = compile(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnfittableArgument);
        assert!(err.message().contains("'qty'"));
        assert!(err.message().contains("on_narrow"));

        Ok(())
    }

    #[test]
    fn test_prototype_longer_than_chain() {
        let mut spec = Specification::new();
        spec.add_callback(
            "on_greedy",
            vec![
                Parameter::new(Integral::U8),
                Parameter::new(Integral::U8),
                Parameter::new(Integral::U8),
            ],
        );
        spec.add_device(
            "1",
            vec![Command::new(FunctionCode::ReadCoils, vec![], "on_greedy")],
        );

        let err = compile(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnfittableArgument);
    }

    #[test]
    fn test_buffer_sizing() -> Result<()> {
        // fields sum to 6 bytes; frame needs 2 + 6 + 2 = 10
        let mut spec = Specification::new();
        spec.add_callback("on_cmd", vec![]);
        spec.add_device(
            "1",
            vec![Command::new(
                FunctionCode::ReadWriteMultipleRegisters,
                vec![
                    Matcher::u16_any(),
                    Matcher::u16_any(),
                    Matcher::u16_any(),
                ],
                "on_cmd",
            )],
        );

        spec.set_buffer_size(8);
        assert_eq!(compile(&spec)?.buf_size(), 10);

        spec.set_buffer_size(32);
        assert_eq!(compile(&spec)?.buf_size(), 32);

        Ok(())
    }

    #[test]
    fn test_bad_literal_in_deserialized_field() -> Result<()> {
        // bypass the checked constructors the way a loaded file can
        let raw = r#"{ "type": "u8", "match": { "exact": 300 } }"#;
        let field: Matcher = serde_json::from_str(raw)?;

        let mut spec = Specification::new();
        spec.add_callback("on_cmd", vec![]);
        spec.add_device(
            "1",
            vec![Command::new(FunctionCode::ReadCoils, vec![field], "on_cmd")],
        );

        let err = compile(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadMatcherLiteral);

        Ok(())
    }

    #[test]
    fn test_malformed_device_address() {
        let mut spec = Specification::new();
        spec.add_callback("on_cmd", vec![]);
        spec.add_device("device@bogus", vec![]);

        let err = compile(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeviceAddress);
    }

    #[test]
    fn test_idempotent_compilation() -> Result<()> {
        let spec = leds_spec();

        let first = compile(&spec)?;
        let second = compile(&spec)?;

        assert_eq!(first, second);
        assert_eq!(serde_json::to_string(&first)?, serde_json::to_string(&second)?);

        Ok(())
    }
}
