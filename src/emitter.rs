use crate::{Integral, Program, State, StateGraph, Transition, DEFAULT_TAB_SIZE};

/// Fixed code template for the generated datagram parser.
///
/// The `@…@` markers are the only variable slots; everything else is the
/// contract shared with the runtime library (`asx/modbus_rtu.hpp`): the state
/// enum, `process_char`, `get_status`, `ready_reply`, `get_buffer`, `reset`,
/// `reply_error`, and the `GOOD_FRAME` / `NOT_FOR_ME` / `BAD_CRC` statuses.
const TEMPLATE: &str = r#"/**
 * This file was generated to create a state machine for processing
 * uart data used for a modbus RTU. It should be included by
 * the modbus_rtu_slave.cpp file only which will create a full rtu slave device.
 */
#include <logger.h>
#include <stdint.h>
#include <asx/modbus_rtu.hpp>

namespace @NAMESPACE@ {
    // All callbacks registered
    @PROTOTYPES@

    // All states to consider
    enum class state_t : uint8_t {
        IGNORE = 0,
        ERROR = 1,
        @ENUMS@
    };

    class Datagram {
        using error_t = asx::modbus::error_t;

        ///< Adjusted buffer to only receive the largest amount of data possible
        inline static uint8_t buffer[@BUFSIZE@];
        ///< Number of characters in the buffer
        inline static uint8_t cnt;
        ///< Number of characters to send
        inline static uint8_t frame_size;
        ///< Error code
        inline static error_t error;
        ///< State
        inline static state_t state;
        ///< CRC for the datagram
        inline static asx::modbus::Crc crc{};

        static inline auto ntoh(const uint8_t offset) -> uint16_t {
            return (static_cast<uint16_t>(buffer[offset]) << 8) | static_cast<uint16_t>(buffer[offset + 1]);
        }

        static inline auto ntohl(const uint8_t offset) -> uint32_t {
            return
                (static_cast<uint32_t>(buffer[offset]) << 24) |
                (static_cast<uint32_t>(buffer[offset+1]) << 16) |
                (static_cast<uint32_t>(buffer[offset+2]) << 8) |
                static_cast<uint16_t>(buffer[offset+3]);
        }

    public:
        // Status of the datagram
        enum class status_t : uint8_t {
            GOOD_FRAME = 0,
            NOT_FOR_ME = 1,
            BAD_CRC = 2
        };

        static void reset() noexcept {
            cnt=0;
            crc.reset();
            error = error_t::ok;
            state = state_t::DEVICE_ADDRESS;
        }

        static status_t get_status() noexcept {
            if (state == state_t::IGNORE) {
                return status_t::NOT_FOR_ME;
            }

            return crc.check() ? status_t::GOOD_FRAME : status_t::BAD_CRC;
        }

        static void process_char(const uint8_t c) noexcept {
            LOG_TRACE("DGRAM", "Char: 0x%.2x, index: %d, state: %d", c, cnt, (uint8_t)state);

            if (state == state_t::IGNORE) {
                return;
            }

            crc(c);

            if (state != state_t::ERROR) {
                // Store the frame
                buffer[cnt++] = c; // Store the data
            }

            switch(state) {
            case state_t::ERROR:
                break;
            @CASES@
            default:
                error = error_t::illegal_data_value;
                state = state_t::ERROR;
                break;
            }
        }

        static void reply_error( error_t err ) noexcept {
            buffer[1] |= 0x80;
            buffer[2] = (uint8_t)err;
            cnt = 3;
        }

        template<typename T>
        static void pack(const T& value) noexcept {
            if constexpr ( sizeof(T) == 1 ) {
                buffer[cnt++] = value;
            } else if constexpr ( sizeof(T) == 2 ) {
                buffer[cnt++] = value >> 8;
                buffer[cnt++] = value & 0xff;
            } else if constexpr ( sizeof(T) == 4 ) {
                buffer[cnt++] = value >> 24;
                buffer[cnt++] = value >> 16 & 0xff;
                buffer[cnt++] = value >> 8 & 0xff;
                buffer[cnt++] = value & 0xff;
            }
        }

        /** Called when a T3.5 has been detected, in a good sequence */
        static void ready_reply() noexcept {
            frame_size = cnt; // Store the frame size
            cnt = 2; // Points to the function code

            switch(state) {
            case state_t::IGNORE:
                break;
            @INCOMPLETE@
                error = error_t::illegal_data_value;
            case state_t::ERROR:
                buffer[1] |= 0x80; // Mark the error
                buffer[2] = (uint8_t)error; // Add the error code
                cnt = 3;
                break;
            @CALLBACKS@
            default:
                break;
            }

            // If the cnt is 2 - nothing was changed in the buffer - return it as is
            if ( cnt == 2 ) {
                // Framesize includes the previous CRC which still holds valid
                cnt = frame_size;
            } else {
                // Add the CRC
                crc.reset();
                auto _crc = crc.update(std::string_view{(char *)buffer, cnt});
                buffer[cnt++] = _crc & 0xff;
                buffer[cnt++] = _crc >> 8;
            }
        }

        static std::string_view get_buffer() noexcept {
            // Return the buffer ready to send
            return std::string_view{(char *)buffer, cnt};
        }
    }; // struct Processor
} // namespace modbus"#;

/// Renders a compiled [Program] through the fixed template.
///
/// The indentation unit is an explicit field so two emitters with different
/// tab sizes can coexist in one process.
#[derive(Clone, Debug, PartialEq)]
pub struct Emitter {
    indent: String,
}

impl Emitter {
    /// Creates an emitter with the default four-space indentation.
    pub fn new() -> Self {
        Self::with_tab_size(DEFAULT_TAB_SIZE)
    }

    /// Creates an emitter indenting with `tab_size` spaces per level.
    pub fn with_tab_size(tab_size: usize) -> Self {
        Self {
            indent: " ".repeat(tab_size),
        }
    }

    /// Renders the generated parser source.
    pub fn render(&self, program: &Program) -> String {
        let slots = [
            ("BUFSIZE", program.buf_size().to_string()),
            ("NAMESPACE", program.namespace().to_string()),
            ("ENUMS", self.enums_text(program)),
            ("CASES", self.cases_text(program)),
            ("CALLBACKS", self.callbacks_text(program)),
            ("INCOMPLETE", self.incomplete_text(program)),
            ("PROTOTYPES", self.prototypes_text(program)),
        ];

        self.substitute(&self.reindent(TEMPLATE), &slots)
    }

    fn tab(&self, level: usize) -> String {
        self.indent.repeat(level)
    }

    /// Comma-separated state names; the reserved `IGNORE` / `ERROR` states
    /// live in the template itself.
    fn enums_text(&self, program: &Program) -> String {
        let tab = self.tab(2);

        program
            .graph()
            .iter()
            .map(|state| format!("{tab}{}", state.name()))
            .collect::<Vec<String>>()
            .join(",\n")
    }

    /// One `case` per branch state, with the per-character dispatch body.
    fn cases_text(&self, program: &Program) -> String {
        let t3 = self.tab(3);
        let t4 = self.tab(4);
        let mut out = String::new();

        for state in program.graph().iter().filter(|s| !s.is_operation()) {
            out.push_str(&format!("{t3}case state_t::{}:\n", state.name()));
            out.push_str(&self.branch_body(program.graph(), state));
            out.push_str(&format!("{t4}break;\n"));
        }

        out
    }

    /// One `case` per operation state: the callback invocation.
    fn callbacks_text(&self, program: &Program) -> String {
        let t3 = self.tab(3);
        let t4 = self.tab(4);
        let mut out = String::new();

        for state in program.graph().iter() {
            if let Some(op) = state.operation() {
                let args = op
                    .args()
                    .iter()
                    .map(|arg| match arg.size() {
                        1 => format!("buffer[{}]", arg.offset()),
                        2 => format!("ntoh({})", arg.offset()),
                        _ => format!("ntohl({})", arg.offset()),
                    })
                    .collect::<Vec<String>>()
                    .join(", ");

                out.push_str(&format!("{t3}case state_t::{}:\n", state.name()));
                out.push_str(&format!("{t4}{}({args});\n", op.callback()));
                out.push_str(&format!("{t4}break;\n"));
            }
        }

        out
    }

    /// Bare labels for every branch state: a frame ending in one of them is
    /// incomplete and falls through to the error reply.
    fn incomplete_text(&self, program: &Program) -> String {
        let t3 = self.tab(3);

        program
            .graph()
            .iter()
            .filter(|state| !state.is_operation())
            .map(|state| format!("{t3}case state_t::{}:\n", state.name()))
            .collect()
    }

    /// Forward declarations for every registered callback.
    fn prototypes_text(&self, program: &Program) -> String {
        let t1 = self.tab(1);
        let mut out = String::new();

        for callback in program.callbacks() {
            let params = callback
                .params()
                .iter()
                .map(|param| match param.name() {
                    Some(name) => format!("{} {name}", param.ty().ctype()),
                    None => param.ty().ctype().to_string(),
                })
                .collect::<Vec<String>>()
                .join(", ");

            out.push_str(&format!("{t1}void {}({params});\n", callback.name()));
        }

        out
    }

    /// Dispatch body of one branch state.
    ///
    /// Transitions are grouped by field type; each group fires only once its
    /// last byte has arrived (`cnt == pos + size`), 16/32-bit groups decode a
    /// local word first, and the trailing arm is either the group's `Any`
    /// transition or the position-keyed protocol error.
    fn branch_body(&self, graph: &StateGraph, state: &State) -> String {
        let t4 = self.tab(4);
        let t5 = self.tab(5);
        let t6 = self.tab(6);
        let mut out = String::new();

        for group in group_by_type(state.transitions()) {
            let size = group[0].matcher().size();
            out.push_str(&format!("{t4}if ( cnt == {} ) {{\n", state.pos() + size));

            // the CRC bytes get no value check; the runtime validates the sum
            if group[0].matcher().shape().is_crc_terminal() {
                out.push_str(&format!(
                    "{t5}state = state_t::{};\n",
                    graph[group[0].next()].name()
                ));
                out.push_str(&format!("{t4}}}\n"));
                continue;
            }

            match size {
                2 => out.push_str(&format!("{t5}auto c = ntoh(cnt - 2);\n\n")),
                4 => out.push_str(&format!("{t5}auto c = ntohl(cnt - 4);\n\n")),
                _ => (),
            }

            let mut guarded = Vec::new();
            let mut fallback = None;

            for transition in group {
                match transition.matcher().predicate() {
                    Some(predicate) => guarded.push((predicate, transition)),
                    None => fallback = fallback.or(Some(transition)),
                }
            }

            if guarded.is_empty() {
                if let Some(transition) = fallback {
                    out.push_str(&format!(
                        "{t5}state = state_t::{};\n",
                        graph[transition.next()].name()
                    ));
                }
            } else {
                for (index, (predicate, transition)) in guarded.iter().enumerate() {
                    if index == 0 {
                        out.push_str(&format!("{t5}if ( {predicate} ) {{\n"));
                    } else {
                        out.push_str(&format!("{t5}}} else if ( {predicate} ) {{\n"));
                    }
                    out.push_str(&format!(
                        "{t6}state = state_t::{};\n",
                        graph[transition.next()].name()
                    ));
                }

                match fallback {
                    Some(transition) => {
                        out.push_str(&format!("{t5}}} else {{\n"));
                        out.push_str(&format!(
                            "{t6}state = state_t::{};\n",
                            graph[transition.next()].name()
                        ));
                        out.push_str(&format!("{t5}}}\n"));
                    }
                    None => {
                        let (err, target) = match state.pos() {
                            0 => ("ignore_frame", "IGNORE"),
                            1 => ("illegal_function_code", "ERROR"),
                            _ => ("illegal_data_value", "ERROR"),
                        };

                        out.push_str(&format!("{t5}}} else {{\n"));
                        out.push_str(&format!("{t6}error = error_t::{err};\n"));
                        out.push_str(&format!("{t6}state = state_t::{target};\n"));
                        out.push_str(&format!("{t5}}}\n"));
                    }
                }
            }

            out.push_str(&format!("{t4}}}\n"));
        }

        out
    }

    /// Rewrites the template's four-space indentation into the configured
    /// unit, so the whole artifact honours the tab-size option.
    fn reindent(&self, text: &str) -> String {
        text.split('\n')
            .map(|line| {
                let spaces = line.len() - line.trim_start_matches(' ').len();
                let level = spaces / 4;
                let remainder = spaces % 4;

                format!(
                    "{}{}{}",
                    self.indent.repeat(level),
                    " ".repeat(remainder),
                    &line[spaces..]
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }

    /// Single substitution pass over the `@…@` markers.
    fn substitute(&self, template: &str, slots: &[(&str, String)]) -> String {
        let mut out = String::with_capacity(template.len() * 2);
        let mut rest = template;

        while let Some(start) = rest.find('@') {
            let after = &rest[start + 1..];

            if let Some(end) = after.find('@') {
                let name = &after[..end];

                if let Some((_, content)) = slots.iter().find(|(slot, _)| *slot == name) {
                    out.push_str(&rest[..start]);
                    out.push_str(content.trim());
                    rest = &after[end + 1..];
                    continue;
                }
            }

            out.push_str(&rest[..=start]);
            rest = &rest[start + 1..];
        }

        out.push_str(rest);
        out
    }
}

crate::impl_default!(Emitter);

fn group_by_type(transitions: &[Transition]) -> Vec<Vec<&Transition>> {
    let mut groups: Vec<(Integral, Vec<&Transition>)> = Vec::new();

    for transition in transitions {
        let ty = transition.matcher().ty();

        match groups.iter_mut().find(|(group_ty, _)| *group_ty == ty) {
            Some((_, group)) => group.push(transition),
            None => groups.push((ty, vec![transition])),
        }
    }

    groups.into_iter().map(|(_, group)| group).collect()
}
