//! Synthetic bundle fixtures in the three supported lexical forms.
//!
//! Each fixture contains the initialize function with the nested state
//! handoff, surrounding unrelated code, and the same structural content
//! a real compiled bundle carries at the fingerprinted sites.

/// Unminified compiler output.
pub(crate) const READABLE_BUNDLE: &str = "\
var app = window.app || {};

function _Platform_initialize(flagDecoder, args, init, update, subscriptions, stepperBuilder)
{
\tvar managers = {};
\tvar initPair = init(args);
\tvar model = initPair.a;
\tvar stepper = stepperBuilder(sendToApp, model);
\tvar ports = _Platform_setupEffects(managers, sendToApp);

\tfunction sendToApp(msg, viewMetadata)
\t{
\t\tvar pair = A2(update, msg, model);
\t\tstepper(model = pair.a, viewMetadata);
\t\t_Platform_enqueueEffects(managers, pair.b, subscriptions(model));
\t}

\t_Platform_enqueueEffects(managers, initPair.b, subscriptions(model));

\treturn ports ? { ports: ports } : {};
}

function _Platform_setupEffects(managers, sendToApp)
{
\treturn { ready: true };
}
";

/// First minifier's output: statements comma-joined inside the handoff.
pub(crate) const MINIFIED_A: &str = r#""use strict";var On=function(n){return{$:0,a:n}};function Wr(r,t,e,i,u,a){var o=e(r),c={},f=o.a,s=a(Vr,f),v=Ar(c,Vr);function Vr(n,r){var t=Cn(i,n,f);s(f=t.a,r),Er(c,t.b,u(f))}Er(c,o.b,u(f));return v?{ports:v}:{}}function Ar(n,r){return{ready:!0}}"#;

/// Second minifier's output: statements stay semicolon-separated.
pub(crate) const MINIFIED_B: &str = r#""use strict";var zn=function(n){return{$:1,a:n}};function Qn(n,r,t,e,i,u){var o=t(n),l={},d=o.a,g=u(Kn,d),m=Bn(l,Kn);function Kn(n,r){var t=An(e,n,d);g(d=t.a,r);En(l,t.b,i(d))}En(l,o.b,i(d));return m?{ports:m}:{}}function Bn(n,r){return{ready:!0}}"#;

/// Unminified randomness-manager registration and init definition.
pub(crate) const READABLE_RANDOM: &str = "\
_Platform_effectManagers['Random'] = _Platform_createManager($app$random$Random$init, $app$random$Random$onEffects, $app$random$Random$onSelfMsg, $app$random$Random$cmdMap);

var $app$random$Random$init = A2(
\t$app$core$Task$andThen,
\tfunction (time) {
\t\treturn $app$core$Task$succeed(
\t\t\t$app$random$Random$initialSeed(
\t\t\t\t$app$time$Time$posixToMillis(time)));
\t},
\t$app$time$Time$now);
";

/// First minifier's randomness registration and init definition.
pub(crate) const MINIFIED_A_RANDOM: &str =
    r#"An.Random=En(Ni,zi,Ri,t((function(n,r){return i(_i,n,r)})));var Ni=Fn(Je,(function(n){return We(function(r){return r+1}(qe.now))}));"#;

/// Second minifier's randomness registration and init definition.
pub(crate) const MINIFIED_B_RANDOM: &str =
    r#"Bn.Random={b:O,c:Oc,d:zn,e:U,f:void 0};O=N(Pe,function(n){return ze((r=ou(n),n=fu(N(Lc,0,1013904223)),fu(N(Lc,n.a+r>>>0,n.b))))});"#;
