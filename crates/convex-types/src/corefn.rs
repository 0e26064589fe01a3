//! # Core Runtime Functions
//!
//! The closed set of native functions exposed by the core account's
//! environment. Each carries a stable wire id (they encode as cells) and
//! the symbol it binds to. Dispatch lives in the CVM crate.

macro_rules! core_fns {
    ($( $variant:ident = ($id:expr, $name:expr) ),* $(,)?) => {
        /// A native core function.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum CoreFn {
            $( $variant, )*
        }

        impl CoreFn {
            /// Every core function.
            pub const ALL: &'static [CoreFn] = &[ $( CoreFn::$variant, )* ];

            /// Stable wire id.
            #[must_use]
            pub fn id(&self) -> u16 {
                match self {
                    $( CoreFn::$variant => $id, )*
                }
            }

            /// The symbol this function binds to in the core environment.
            #[must_use]
            pub fn name(&self) -> &'static str {
                match self {
                    $( CoreFn::$variant => $name, )*
                }
            }

            /// Core function for a wire id.
            #[must_use]
            pub fn from_id(id: u16) -> Option<CoreFn> {
                match id {
                    $( $id => Some(CoreFn::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

core_fns! {
    // Numeric tower
    Add = (0, "+"),
    Sub = (1, "-"),
    Mul = (2, "*"),
    Div = (3, "/"),
    Equals = (4, "="),
    NumEquals = (5, "=="),
    Lt = (6, "<"),
    Gt = (7, ">"),
    Le = (8, "<="),
    Ge = (9, ">="),
    Min = (10, "min"),
    Max = (11, "max"),
    Inc = (12, "inc"),
    Dec = (13, "dec"),
    Abs = (14, "abs"),
    Signum = (15, "signum"),
    Mod = (16, "mod"),
    Quot = (17, "quot"),
    Rem = (18, "rem"),

    // Casts
    CastLong = (30, "long"),
    CastDouble = (31, "double"),
    CastByte = (32, "byte"),
    CastChar = (33, "char"),
    CastBoolean = (34, "boolean"),
    CastBlob = (35, "blob"),
    CastAddress = (36, "address"),
    CastKeyword = (37, "keyword"),
    CastSymbol = (38, "symbol"),
    Str = (39, "str"),
    Name = (40, "name"),
    Not = (41, "not"),
    HashFn = (42, "hash"),

    // Predicates
    NilQ = (50, "nil?"),
    BooleanQ = (51, "boolean?"),
    NumberQ = (52, "number?"),
    LongQ = (53, "long?"),
    DoubleQ = (54, "double?"),
    BlobQ = (55, "blob?"),
    StringQ = (56, "str?"),
    SymbolQ = (57, "symbol?"),
    KeywordQ = (58, "keyword?"),
    AddressQ = (59, "address?"),
    VectorQ = (60, "vector?"),
    ListQ = (61, "list?"),
    MapQ = (62, "map?"),
    SetQ = (63, "set?"),
    FnQ = (64, "fn?"),
    CollQ = (65, "coll?"),
    EmptyQ = (66, "empty?"),
    ZeroQ = (67, "zero?"),
    ContainsKeyQ = (68, "contains-key?"),
    ActorQ = (69, "actor?"),
    AccountQ = (70, "account?"),
    CallableQ = (71, "callable?"),

    // Collections
    VectorFn = (80, "vector"),
    ListFn = (81, "list"),
    HashMapFn = (82, "hash-map"),
    HashSetFn = (83, "hash-set"),
    BlobMapFn = (84, "blob-map"),
    Conj = (85, "conj"),
    Cons = (86, "cons"),
    Get = (87, "get"),
    Assoc = (88, "assoc"),
    Dissoc = (89, "dissoc"),
    Count = (90, "count"),
    Empty = (91, "empty"),
    First = (92, "first"),
    Second = (93, "second"),
    Last = (94, "last"),
    Next = (95, "next"),
    Nth = (96, "nth"),
    Concat = (97, "concat"),
    Into = (98, "into"),
    Reduce = (99, "reduce"),
    Reduced = (100, "reduced"),
    MapFn = (101, "map"),
    Apply = (102, "apply"),
    Keys = (103, "keys"),
    Vals = (104, "vals"),

    // Control
    Fail = (110, "fail"),
    AssertFn = (111, "assert"),
    Halt = (112, "halt"),
    Rollback = (113, "rollback"),
    Return = (114, "return"),
    Recur = (115, "recur"),
    Tailcall = (116, "tailcall"),

    // Accounts and economics
    Transfer = (130, "transfer"),
    Accept = (131, "accept"),
    CallFn = (132, "call"),
    CreateAccount = (133, "create-account"),
    Deploy = (134, "deploy"),
    SetKey = (135, "set-key"),
    SetController = (136, "set-controller"),
    TransferMemory = (137, "transfer-memory"),
    SetMemory = (138, "set-memory"),
    ScheduleStar = (139, "schedule*"),
    Eval = (140, "eval"),
    EvalAs = (141, "eval-as"),
    Log = (142, "log"),
    BalanceFn = (143, "balance"),
    AccountFn = (144, "account"),
    GetHolding = (145, "get-holding"),
    SetHolding = (146, "set-holding"),
    Lookup = (147, "lookup"),
    LookupMeta = (148, "lookup-meta"),
    SyntaxFn = (149, "syntax"),
    Meta = (150, "meta"),

    // Peers and staking
    CreatePeer = (160, "create-peer"),
    SetStake = (161, "set-stake"),
    Stake = (162, "stake"),
    SetPeerData = (163, "set-peer-data"),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        for f in CoreFn::ALL {
            assert_eq!(CoreFn::from_id(f.id()), Some(*f));
        }
        assert_eq!(CoreFn::from_id(9999), None);
    }

    #[test]
    fn test_ids_unique() {
        let mut ids: Vec<u16> = CoreFn::ALL.iter().map(CoreFn::id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), CoreFn::ALL.len());
    }

    #[test]
    fn test_names_unique() {
        let mut names: Vec<&str> = CoreFn::ALL.iter().map(CoreFn::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CoreFn::ALL.len());
    }
}
